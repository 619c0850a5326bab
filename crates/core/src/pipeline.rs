//! Pipeline for converting labeled completions into token/tag training files.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::align::{align, Tag};
use crate::completion::{check_spans, Completion, FormatError};
use crate::store::{BlobStore, StoreError};
use crate::{Tokenizer, DEFAULT_TRAIN_FRACTION, TEST_PREFIXES, TRAIN_PREFIX};

/// Errors raised while converting a set of documents.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid document {key:?}")]
    Format {
        key: String,
        #[source]
        source: FormatError,
    },

    #[error("number of examples should be > 1, found {found}")]
    TooFewExamples { found: usize },

    #[error("train fraction must be within [0, 1], got {0}")]
    InvalidTrainFraction(f64),
}

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Fraction of examples written to the train split.
    pub train_fraction: f64,
    /// Log and skip malformed documents instead of failing.
    pub skip_invalid: bool,
    /// Only keys starting with this prefix are read from the input store.
    pub input_prefix: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            skip_invalid: false,
            input_prefix: String::new(),
        }
    }
}

impl ConverterConfig {
    pub fn validate(&self) -> Result<(), ConvertError> {
        validate_fraction(self.train_fraction)
    }
}

fn validate_fraction(fraction: f64) -> Result<(), ConvertError> {
    if fraction.is_finite() && (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(ConvertError::InvalidTrainFraction(fraction))
    }
}

/// Tokens and tags of a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub key: String,
    pub tokens: Vec<String>,
    pub tags: Vec<Tag>,
}

impl Example {
    pub fn from_completion<T>(key: impl Into<String>, completion: &Completion, tokenizer: &T) -> Self
    where
        T: Tokenizer + ?Sized,
    {
        let tokens = tokenizer.tokenize(&completion.text);
        let tags = align(&tokens, &completion.spans);
        Self {
            key: key.into(),
            tokens: tokens.into_iter().map(|t| t.text).collect(),
            tags,
        }
    }
}

/// Examples gathered from an input store.
#[derive(Debug)]
pub struct CollectedExamples {
    /// In ascending key order.
    pub examples: Vec<Example>,
    pub skipped: usize,
}

/// Result of a full conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionSummary {
    pub total_documents: usize,
    pub skipped_documents: usize,
    pub train_examples: usize,
    pub test_examples: usize,
    pub total_tokens: usize,
    /// `O` plus every `B-`/`I-` tag that was emitted, sorted.
    pub tag_vocabulary: Vec<String>,
    /// Keys written to the output store.
    pub files: Vec<String>,
}

fn load_example<S, T>(store: &S, key: &str, tokenizer: &T) -> Result<Example, ConvertError>
where
    S: BlobStore + ?Sized,
    T: Tokenizer + ?Sized,
{
    let bytes = store.get(key)?;
    let completion = Completion::from_slice(&bytes).map_err(|source| ConvertError::Format {
        key: key.to_string(),
        source,
    })?;

    for issue in check_spans(completion.text.chars().count(), &completion.spans) {
        tracing::warn!("{}: {}", key, issue);
    }

    let example = Example::from_completion(key, &completion, tokenizer);
    tracing::debug!(
        key,
        tokens = example.tokens.len(),
        spans = completion.spans.len(),
        "Aligned document"
    );
    Ok(example)
}

/// Whether `key` names an input document directly under `prefix`.
///
/// Only `.json` keys with no further `/` after the prefix count, so nested
/// directories (an output directory inside the input one, say) are ignored.
fn is_document_key(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|name| !name.contains('/') && name.ends_with(".json"))
}

/// Parse and align every `.json` document directly under the configured prefix.
///
/// Documents are processed in parallel with rayon; the result keeps the
/// store's key order.
pub fn collect_examples<S, T>(
    store: &S,
    tokenizer: &T,
    config: &ConverterConfig,
) -> Result<CollectedExamples, ConvertError>
where
    S: BlobStore + Sync + ?Sized,
    T: Tokenizer + Sync + ?Sized,
{
    let keys: Vec<String> = store
        .list(&config.input_prefix)?
        .into_iter()
        .filter(|key| is_document_key(key, &config.input_prefix))
        .collect();

    let total = keys.len();
    tracing::info!(
        "Collecting tokens & tags from {} documents in {}",
        total,
        store.location()
    );

    let processed = AtomicUsize::new(0);
    let results: Vec<Result<Example, ConvertError>> = keys
        .into_par_iter()
        .map(|key| {
            let result = load_example(store, &key, tokenizer);
            let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 1000 == 0 || count == total {
                tracing::info!("Processed {}/{} documents...", count, total);
            }
            result
        })
        .collect();

    let mut examples = Vec::with_capacity(results.len());
    let mut skipped = 0;
    for result in results {
        match result {
            Ok(example) => examples.push(example),
            Err(ConvertError::Format { key, source }) if config.skip_invalid => {
                tracing::warn!("Skipping {:?}: {}", key, source);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if skipped > 0 {
        tracing::warn!("{} documents failed to convert and were skipped", skipped);
    }

    Ok(CollectedExamples { examples, skipped })
}

/// Number of examples going to the train split.
///
/// `floor(fraction * n)`, capped so at least one example is held out.
pub fn split_point(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64) as usize).min(n.saturating_sub(1))
}

/// Render examples as parallel lines of tokens and tags.
fn render_lines(examples: &[Example]) -> (String, String) {
    let mut words = String::new();
    let mut tags = String::new();
    for example in examples {
        words.push_str(&example.tokens.join(" "));
        words.push('\n');

        let line: Vec<String> = example.tags.iter().map(Tag::to_string).collect();
        tags.push_str(&line.join(" "));
        tags.push('\n');
    }
    (words, tags)
}

fn write_split<S>(store: &mut S, prefix: &str, examples: &[Example]) -> Result<[String; 2], ConvertError>
where
    S: BlobStore + ?Sized,
{
    let words_key = format!("{}.words.txt", prefix);
    let tags_key = format!("{}.tags.txt", prefix);
    tracing::info!(
        "Saving {} examples to {} (tokens) and {} (tags)",
        examples.len(),
        words_key,
        tags_key
    );

    let (words, tags) = render_lines(examples);
    store.set(&words_key, words.as_bytes())?;
    store.set(&tags_key, tags.as_bytes())?;
    Ok([words_key, tags_key])
}

/// Split examples and write the train and test files.
///
/// Examples before the split point go to `train`; the rest go to both
/// `testa` and `testb`. Returns the written keys.
pub fn write_examples<S>(
    store: &mut S,
    examples: &[Example],
    train_fraction: f64,
) -> Result<Vec<String>, ConvertError>
where
    S: BlobStore + ?Sized,
{
    validate_fraction(train_fraction)?;
    if examples.len() <= 1 {
        return Err(ConvertError::TooFewExamples {
            found: examples.len(),
        });
    }

    let (train, test) = examples.split_at(split_point(examples.len(), train_fraction));

    let mut files = Vec::with_capacity(2 * (1 + TEST_PREFIXES.len()));
    files.extend(write_split(store, TRAIN_PREFIX, train)?);
    for prefix in TEST_PREFIXES {
        files.extend(write_split(store, prefix, test)?);
    }
    Ok(files)
}

fn tag_vocabulary(examples: &[Example]) -> Vec<String> {
    let mut vocabulary: BTreeSet<String> = examples
        .iter()
        .flat_map(|example| example.tags.iter().map(Tag::to_string))
        .collect();
    vocabulary.insert(Tag::Outside.to_string());
    vocabulary.into_iter().collect()
}

/// Convert every document in `input` and write the splits to `output`.
pub fn convert<S, O, T>(
    input: &S,
    output: &mut O,
    tokenizer: &T,
    config: &ConverterConfig,
) -> Result<ConversionSummary, ConvertError>
where
    S: BlobStore + Sync + ?Sized,
    O: BlobStore + ?Sized,
    T: Tokenizer + Sync + ?Sized,
{
    config.validate()?;

    let CollectedExamples { examples, skipped } = collect_examples(input, tokenizer, config)?;
    let files = write_examples(output, &examples, config.train_fraction)?;

    let train_examples = split_point(examples.len(), config.train_fraction);
    Ok(ConversionSummary {
        total_documents: examples.len() + skipped,
        skipped_documents: skipped,
        train_examples,
        test_examples: examples.len() - train_examples,
        total_tokens: examples.iter().map(|e| e.tokens.len()).sum(),
        tag_vocabulary: tag_vocabulary(&examples),
        files,
    })
}
