//! Alignment of labeled character spans onto tokens as BIO tags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tokenize::Token;

/// A labeled character range in the source text.
///
/// Only the first entry of `labels` is used when tagging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub labels: Vec<String>,
}

impl Span {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            labels: vec![label.into()],
        }
    }

    /// The label used for tagging. Empty if the span carries no labels.
    pub fn label(&self) -> &str {
        self.labels.first().map_or("", String::as_str)
    }
}

/// BIO tag attached to a single token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// `O`: the token is outside every span.
    Outside,
    /// `B-<label>`: first token of a span.
    Begin(String),
    /// `I-<label>`: continuation of the span started by the preceding `B-`.
    Inside(String),
}

impl Tag {
    pub fn label(&self) -> Option<&str> {
        match self {
            Tag::Outside => None,
            Tag::Begin(label) | Tag::Inside(label) => Some(label),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Outside => f.write_str("O"),
            Tag::Begin(label) => write!(f, "B-{}", label),
            Tag::Inside(label) => write!(f, "I-{}", label),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Prefix {
    Begin,
    Inside,
}

/// Tag each token with the span it falls into.
///
/// Spans are visited in ascending `start` order through a cursor over a
/// sorted view; the input slice is left untouched. Returns exactly one tag per
/// token.
///
/// A span is left once a token reaches its `end` offset, read as the span's
/// last character. A token starting after the current span's `end` is tagged
/// `O` without moving on to the next span. When a span's `end` lies past its
/// last token (trailing whitespace, or an end one past the last character)
/// the cursor stalls there, and tokens of the following spans come out as `O`.
pub fn align(tokens: &[Token], spans: &[Span]) -> Vec<Tag> {
    let mut queue: Vec<&Span> = spans.iter().collect();
    queue.sort_by_key(|span| span.start);

    let mut cursor = 0;
    let mut prefix = Prefix::Begin;
    let mut tags = Vec::with_capacity(tokens.len());

    for token in tokens {
        let Some(span) = queue.get(cursor) else {
            tags.push(Tag::Outside);
            continue;
        };

        // `token.end` is exclusive, so `token.end <= span.start` means the
        // token's last character sits before the span.
        if token.end <= span.start || token.start > span.end {
            tags.push(Tag::Outside);
            continue;
        }

        let label = span.label().to_string();
        tags.push(match prefix {
            Prefix::Begin => Tag::Begin(label),
            Prefix::Inside => Tag::Inside(label),
        });

        if span.end >= token.end {
            prefix = Prefix::Inside;
        } else {
            cursor += 1;
            prefix = Prefix::Begin;
        }
    }

    tags
}
