//! Tokenizers producing tokens with character offsets.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::Tokenizer;

// Word runs (kept whole across inner apostrophes/hyphens), or any single
// non-space symbol.
static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:['’-]\w+)*|[^\w\s]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

/// A token and its position in the source text.
///
/// Offsets count characters (Unicode scalar values), not bytes, so they line
/// up with the span offsets found in labeling exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    /// Character offset of the first character (inclusive).
    pub start: usize,
    /// Character offset just past the last character (exclusive).
    pub end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, start: usize) -> Self {
        let text = text.into();
        let end = start + text.chars().count();
        Self { text, start, end }
    }
}

/// Splits text into words and standalone punctuation.
///
/// `"Dr. O'Neil, New-York"` becomes `Dr`, `.`, `O'Neil`, `,`, `New-York`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        collect_matches(&WORD_RE, text)
    }
}

/// Splits text on whitespace only.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        collect_matches(&WHITESPACE_RE, text)
    }
}

/// Runtime choice between the built-in tokenizers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Word,
    Whitespace,
}

impl Tokenizer for TokenizerKind {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        match self {
            TokenizerKind::Word => WordTokenizer.tokenize(text),
            TokenizerKind::Whitespace => WhitespaceTokenizer.tokenize(text),
        }
    }
}

/// Turn regex matches into tokens, translating byte offsets to char offsets.
fn collect_matches(re: &Regex, text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut byte_pos = 0;
    let mut char_pos = 0;

    for m in re.find_iter(text) {
        char_pos += text[byte_pos..m.start()].chars().count();
        let token = Token::new(m.as_str(), char_pos);
        char_pos = token.end;
        byte_pos = m.end();
        tokens.push(token);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(tokens: &[Token]) -> Vec<(&str, usize)> {
        tokens.iter().map(|t| (t.text.as_str(), t.start)).collect()
    }

    #[test]
    fn test_word_tokenizer_offsets() {
        let tokens = WordTokenizer.tokenize("New York is great");
        assert_eq!(
            pairs(&tokens),
            vec![("New", 0), ("York", 4), ("is", 9), ("great", 12)]
        );
        assert_eq!(tokens[1].end, 8);
    }

    #[test]
    fn test_word_tokenizer_punctuation() {
        let tokens = WordTokenizer.tokenize("Hello, world! Don't stop-gap.");
        assert_eq!(
            pairs(&tokens),
            vec![
                ("Hello", 0),
                (",", 5),
                ("world", 7),
                ("!", 12),
                ("Don't", 14),
                ("stop-gap", 20),
                (".", 28),
            ]
        );
    }

    #[test]
    fn test_offsets_are_characters_not_bytes() {
        let tokens = WordTokenizer.tokenize("São Paulo é linda");
        assert_eq!(
            pairs(&tokens),
            vec![("São", 0), ("Paulo", 4), ("é", 10), ("linda", 12)]
        );
    }

    #[test]
    fn test_whitespace_tokenizer() {
        let tokens = WhitespaceTokenizer.tokenize("  Hello,   world!\n");
        assert_eq!(pairs(&tokens), vec![("Hello,", 2), ("world!", 11)]);
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(TokenizerKind::Word.tokenize("a,b").len(), 3);
        assert_eq!(TokenizerKind::Whitespace.tokenize("a,b").len(), 1);
        assert!(TokenizerKind::default().tokenize("   ").is_empty());
    }
}
