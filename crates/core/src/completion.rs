//! Typed parsing of exported completion documents.
//!
//! A document looks like:
//!
//! ```json
//! {
//!   "data": { "text": "New York is great" },
//!   "completion": { "result": "[{\"value\": {\"start\": 0, \"end\": 8, \"labels\": [\"LOC\"]}}]" }
//! }
//! ```
//!
//! `completion.result` is normally a JSON-encoded string; newer exports inline
//! the list directly, and both are accepted.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::align::Span;

/// Errors raised while parsing a completion document.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed completion document: {0}")]
    Document(#[source] serde_json::Error),

    #[error("`completion.result` must be a JSON-encoded string or a list, found {found}")]
    ResultType { found: &'static str },

    #[error("malformed `completion.result`: {0}")]
    Result(#[source] serde_json::Error),

    #[error("result item {index} has no labels")]
    MissingLabel { index: usize },

    #[error("result item {index} ends before it starts ({start} > {end})")]
    InvertedSpan { index: usize, start: usize, end: usize },
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    data: RawData,
    completion: RawCompletion,
}

#[derive(Debug, Deserialize)]
struct RawData {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawCompletion {
    result: Value,
}

#[derive(Debug, Deserialize)]
struct RawResultItem {
    value: Span,
}

/// The text of one labeled document and its spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub spans: Vec<Span>,
}

impl Completion {
    /// Parse a completion document from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FormatError> {
        let raw: RawDocument = serde_json::from_slice(bytes).map_err(FormatError::Document)?;

        let items: Vec<RawResultItem> = match raw.completion.result {
            Value::String(encoded) => {
                serde_json::from_str(&encoded).map_err(FormatError::Result)?
            }
            list @ Value::Array(_) => serde_json::from_value(list).map_err(FormatError::Result)?,
            other => {
                return Err(FormatError::ResultType {
                    found: json_type_name(&other),
                })
            }
        };

        let spans = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let span = item.value;
                if span.labels.is_empty() {
                    return Err(FormatError::MissingLabel { index });
                }
                if span.start > span.end {
                    return Err(FormatError::InvertedSpan {
                        index,
                        start: span.start,
                        end: span.end,
                    });
                }
                Ok(span)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            text: raw.data.text,
            spans,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Suspicious but tolerated span layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanIssue {
    /// Two spans share characters. Indices refer to the input order.
    Overlap { first: usize, second: usize },
    /// The span runs past the end of the text.
    PastEnd { index: usize, end: usize, text_len: usize },
}

impl fmt::Display for SpanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanIssue::Overlap { first, second } => {
                write!(f, "spans {} and {} overlap", first, second)
            }
            SpanIssue::PastEnd {
                index,
                end,
                text_len,
            } => write!(
                f,
                "span {} ends at {} but the text is {} characters long",
                index, end, text_len
            ),
        }
    }
}

/// Report overlapping spans and spans extending past the text.
///
/// `text_len` is measured in characters. Span ends are treated as exclusive,
/// the way labeling exports record them.
pub fn check_spans(text_len: usize, spans: &[Span]) -> Vec<SpanIssue> {
    let mut issues: Vec<SpanIssue> = spans
        .iter()
        .enumerate()
        .filter(|(_, span)| span.end > text_len)
        .map(|(index, span)| SpanIssue::PastEnd {
            index,
            end: span.end,
            text_len,
        })
        .collect();

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| spans[i].start);

    // Track the span reaching furthest so far; anything starting before it overlaps.
    let mut furthest: Option<usize> = None;
    for &i in &order {
        if let Some(prev) = furthest {
            if spans[i].start < spans[prev].end {
                issues.push(SpanIssue::Overlap {
                    first: prev.min(i),
                    second: prev.max(i),
                });
            }
            if spans[i].end > spans[prev].end {
                furthest = Some(i);
            }
        } else {
            furthest = Some(i);
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encoded_result() {
        let doc = br#"{
            "data": {"text": "New York is great"},
            "completion": {"result": "[{\"id\": \"a1\", \"value\": {\"start\": 0, \"end\": 8, \"text\": \"New York\", \"labels\": [\"LOC\"]}}]"}
        }"#;
        let completion = Completion::from_slice(doc).unwrap();
        assert_eq!(completion.text, "New York is great");
        assert_eq!(completion.spans, vec![Span::new(0, 8, "LOC")]);
    }

    #[test]
    fn test_parse_inline_result() {
        let doc = br#"{
            "data": {"text": "Alice met Bob"},
            "completion": {"result": [
                {"value": {"start": 10, "end": 13, "labels": ["PER"]}},
                {"value": {"start": 0, "end": 5, "labels": ["PER", "NAME"]}}
            ]}
        }"#;
        let completion = Completion::from_slice(doc).unwrap();
        assert_eq!(completion.spans.len(), 2);
        assert_eq!(completion.spans[1].label(), "PER");
    }

    #[test]
    fn test_parse_empty_result() {
        let doc = br#"{"data": {"text": "plain"}, "completion": {"result": "[]"}}"#;
        let completion = Completion::from_slice(doc).unwrap();
        assert!(completion.spans.is_empty());
    }

    #[test]
    fn test_missing_text_is_descriptive() {
        let doc = br#"{"data": {}, "completion": {"result": "[]"}}"#;
        let err = Completion::from_slice(doc).unwrap_err();
        assert!(matches!(err, FormatError::Document(_)));
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn test_result_of_wrong_type() {
        let doc = br#"{"data": {"text": "x"}, "completion": {"result": 42}}"#;
        let err = Completion::from_slice(doc).unwrap_err();
        assert!(matches!(err, FormatError::ResultType { found: "a number" }));
    }

    #[test]
    fn test_result_string_not_json() {
        let doc = br#"{"data": {"text": "x"}, "completion": {"result": "not json"}}"#;
        let err = Completion::from_slice(doc).unwrap_err();
        assert!(matches!(err, FormatError::Result(_)));
    }

    #[test]
    fn test_item_without_value() {
        let doc = br#"{"data": {"text": "x"}, "completion": {"result": [{"from_name": "label"}]}}"#;
        let err = Completion::from_slice(doc).unwrap_err();
        assert!(err.to_string().contains("value"));
    }

    #[test]
    fn test_empty_labels_rejected() {
        let doc = br#"{"data": {"text": "x y"}, "completion": {"result": [
            {"value": {"start": 0, "end": 1, "labels": ["A"]}},
            {"value": {"start": 2, "end": 3, "labels": []}}
        ]}}"#;
        let err = Completion::from_slice(doc).unwrap_err();
        assert!(matches!(err, FormatError::MissingLabel { index: 1 }));
    }

    #[test]
    fn test_inverted_span_rejected() {
        let doc = br#"{"data": {"text": "abc"}, "completion": {"result": [
            {"value": {"start": 2, "end": 1, "labels": ["A"]}}
        ]}}"#;
        let err = Completion::from_slice(doc).unwrap_err();
        assert_eq!(err.to_string(), "result item 0 ends before it starts (2 > 1)");
    }

    #[test]
    fn test_check_spans_clean() {
        let spans = vec![Span::new(6, 9, "B"), Span::new(0, 5, "A")];
        assert!(check_spans(9, &spans).is_empty());
    }

    #[test]
    fn test_check_spans_overlap_and_past_end() {
        let spans = vec![
            Span::new(0, 10, "A"),
            Span::new(4, 6, "B"),
            Span::new(8, 20, "C"),
        ];
        let issues = check_spans(12, &spans);
        assert_eq!(
            issues,
            vec![
                SpanIssue::PastEnd {
                    index: 2,
                    end: 20,
                    text_len: 12
                },
                SpanIssue::Overlap { first: 0, second: 1 },
                SpanIssue::Overlap { first: 0, second: 2 },
            ]
        );
        assert_eq!(issues[1].to_string(), "spans 0 and 1 overlap");
    }
}
