//! Inbound descriptors supplied by the page layer

use serde::{Deserialize, Serialize};

/// Describes the text-entry field a prompt was typed into.
///
/// Used only to compose operation prompts; never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldContext {
    /// Field kind as reported by the page (e.g. "textarea", "search").
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub value: String,
}

impl FieldContext {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            ..Default::default()
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// Extra page-level context for the context-rich analysis variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Visible text near the field (labels, headings).
    #[serde(default)]
    pub surrounding_text: String,
}

/// One answered clarifying question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingAnswer {
    pub question: String,
    pub answer: String,
}

impl ClarifyingAnswer {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}
