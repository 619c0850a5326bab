//! CLI tool for converting labeling results into NER training files.
//!
//! Reads exported completion documents from a directory and writes
//! `train`, `testa` and `testb` splits as parallel `*.words.txt` /
//! `*.tags.txt` files in the format expected by tf_ner.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use ner_convert_core::{
    convert, BlobStore, ConversionSummary, ConverterConfig, LocalStore, TokenizerKind,
    DEFAULT_TRAIN_FRACTION,
};

const TRAINER_URL: &str = "https://github.com/guillaumegenthial/tf_ner";

/// Convert labeling results to the token/tag format accepted by tf_ner.
#[derive(Parser, Debug)]
#[command(name = "ner-convert")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input directory where labeling results are saved (e.g. "<project_path>/completions")
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Fraction of examples used for train
    #[arg(short = 'n', long, default_value_t = DEFAULT_TRAIN_FRACTION)]
    num_train: f64,

    /// How document text is split into tokens
    #[arg(long, value_enum, default_value_t = TokenizerArg::Word)]
    tokenizer: TokenizerArg,

    /// Only read input files whose relative path starts with this prefix
    #[arg(long, default_value = "")]
    prefix: String,

    /// Skip malformed documents instead of aborting
    #[arg(long)]
    skip_invalid: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TokenizerArg {
    /// Words and standalone punctuation
    Word,
    /// Runs of non-whitespace characters
    Whitespace,
}

impl From<TokenizerArg> for TokenizerKind {
    fn from(arg: TokenizerArg) -> Self {
        match arg {
            TokenizerArg::Word => TokenizerKind::Word,
            TokenizerArg::Whitespace => TokenizerKind::Whitespace,
        }
    }
}

fn write_metadata(output: &mut LocalStore, args: &Args, summary: &ConversionSummary) -> Result<()> {
    let tokenizer = TokenizerKind::from(args.tokenizer);
    let metadata = serde_json::json!({
        "config": {
            "input": args.input.to_string_lossy(),
            "output": args.output.to_string_lossy(),
            "num_train": args.num_train,
            "tokenizer": tokenizer,
            "prefix": args.prefix,
            "skip_invalid": args.skip_invalid,
        },
        "counts": {
            "total_documents": summary.total_documents,
            "skipped_documents": summary.skipped_documents,
            "train_examples": summary.train_examples,
            "test_examples": summary.test_examples,
            "total_tokens": summary.total_tokens,
        },
        "tag_vocabulary": summary.tag_vocabulary,
        "files": summary.files,
    });
    output.set(
        "metadata.json",
        serde_json::to_string_pretty(&metadata)?.as_bytes(),
    )?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ner_convert=info".parse()?)
                .add_directive("ner_convert_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ConverterConfig {
        train_fraction: args.num_train,
        skip_invalid: args.skip_invalid,
        input_prefix: args.prefix.clone(),
    };
    let tokenizer = TokenizerKind::from(args.tokenizer);

    let input = LocalStore::new(&args.input);
    let mut output = LocalStore::create(&args.output)
        .with_context(|| format!("Cannot create output directory {:?}", args.output))?;

    tracing::info!("Converting {} into {}", input.location(), output.location());
    let summary = convert(&input, &mut output, &tokenizer, &config)
        .with_context(|| format!("Failed to convert documents from {:?}", args.input))?;

    write_metadata(&mut output, &args, &summary).context("Failed to write metadata.json")?;

    println!("\n[summary]");
    println!("  Documents: {}", summary.total_documents);
    println!("  Skipped: {}", summary.skipped_documents);
    println!("  Train examples: {}", summary.train_examples);
    println!("  Test examples: {}", summary.test_examples);
    println!("  Total tokens: {}", summary.total_tokens);
    println!("  Tags: {}", summary.tag_vocabulary.join(" "));
    println!("  Output: {:?}/{{train,testa,testb}}.{{words,tags}}.txt", args.output);
    println!(
        "\nDone! Now go to {} and proceed with the instructions on how to train, evaluate and deploy models",
        TRAINER_URL
    );

    Ok(())
}
