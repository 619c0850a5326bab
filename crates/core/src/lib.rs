//! Core conversion logic for turning exported labeling results into NER
//! training data.
//!
//! Each exported completion carries raw text plus labeled character spans.
//! The text is tokenized, [`align`] maps the spans onto the tokens as BIO
//! tags, and the [`pipeline`] writes parallel `*.words.txt` / `*.tags.txt`
//! files split into train and test sets.

/// Trait for tokenization operations.
///
/// Implementors split text into [`Token`]s carrying their character offset in
/// the source string. Tokens must be returned left-to-right, must not overlap
/// and must not contain whitespace (output lines are space-joined).
pub trait Tokenizer {
    /// Split `text` into tokens with character offsets.
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

// Blanket implementation for references to Tokenizers
impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        (*self).tokenize(text)
    }
}

mod align;
mod completion;
pub mod pipeline;
pub mod store;
mod tokenize;

pub use align::{align, Span, Tag};
pub use completion::{check_spans, Completion, FormatError, SpanIssue};
pub use pipeline::{
    collect_examples, convert, split_point, write_examples, CollectedExamples, ConversionSummary,
    ConvertError, ConverterConfig, Example,
};
pub use store::{BlobStore, LocalStore, MemoryStore, StoreError};
pub use tokenize::{Token, TokenizerKind, WhitespaceTokenizer, WordTokenizer};

/// Default fraction of examples written to the train split.
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Output file prefix for the training split.
pub const TRAIN_PREFIX: &str = "train";

/// Output file prefixes for the held-out splits. Both receive the same examples.
pub const TEST_PREFIXES: [&str; 2] = ["testa", "testb"];
