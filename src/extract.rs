//! Structured-value extraction from free-form model output.
//!
//! Models are asked for JSON but routinely wrap it in prose or markdown
//! fences. [`parse_model_output`] tries, in order, stopping at the first
//! success:
//!
//! 1. the whole trimmed text;
//! 2. the body of the first fenced code block;
//! 3. the first `{` up to its balanced `}`, then up to the last `}`.
//!
//! Only objects and arrays count as structured; a bare number or string
//! falls through to the next strategy. When nothing parses the error
//! carries a truncated excerpt of the input.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{HuginnError, Result};

/// Maximum characters of model output kept in a parse error.
pub const EXCERPT_CHARS: usize = 200;

/// Which extraction strategy produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Direct,
    Fenced,
    Braces,
}

impl ExtractionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStrategy::Direct => "direct",
            ExtractionStrategy::Fenced => "fenced",
            ExtractionStrategy::Braces => "braces",
        }
    }
}

/// A structured value pulled out of model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub strategy: ExtractionStrategy,
}

/// Extract a structured value from raw model text.
pub fn parse_model_output(text: &str) -> Result<Extracted> {
    let trimmed = text.trim();

    if let Some(value) = parse_structured(trimmed) {
        return Ok(Extracted {
            value,
            strategy: ExtractionStrategy::Direct,
        });
    }

    if let Some(value) = fenced_block(trimmed).and_then(parse_structured) {
        return Ok(Extracted {
            value,
            strategy: ExtractionStrategy::Fenced,
        });
    }

    let braces = balanced_object(trimmed)
        .and_then(parse_structured)
        .or_else(|| outer_braces(trimmed).and_then(parse_structured));
    if let Some(value) = braces {
        return Ok(Extracted {
            value,
            strategy: ExtractionStrategy::Braces,
        });
    }

    Err(HuginnError::ResponseParse {
        excerpt: excerpt(trimmed),
    })
}

/// Extract and decode model output into `T`.
///
/// Returns the decoded payload together with the strategy that found it.
/// A value that extracts but does not match `T` is reported as a parse
/// error as well.
pub fn parse_as<T: DeserializeOwned>(text: &str) -> Result<(T, ExtractionStrategy)> {
    let extracted = parse_model_output(text)?;
    let payload = serde_json::from_value(extracted.value).map_err(|_| {
        HuginnError::ResponseParse {
            excerpt: excerpt(text.trim()),
        }
    })?;
    Ok((payload, extracted.strategy))
}

/// Truncate `text` to [`EXCERPT_CHARS`] characters.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn parse_structured(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Body of the first ``` fence, skipping an optional language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    // language tag runs to the end of the opening line
    let body_start = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains('{') => newline + 1,
        _ => 0,
    };
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// The first `{` through its matching `}`, honouring JSON string escapes.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The first `{` through the last `}`.
fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
