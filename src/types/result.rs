//! Result objects handed back to the UI layer.
//!
//! Every orchestrator operation resolves to one of these shapes. A failed
//! operation is still a value: `success` is `false`, `provider` is
//! [`ERROR_PROVIDER`], `confidence` is zero and `issues`/`suggestions`
//! explain what went wrong.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HuginnError;

/// Provider name reported on structured failure results.
pub const ERROR_PROVIDER: &str = "error";

/// Vagueness score used when the model omits one.
pub const DEFAULT_VAGUENESS_SCORE: u8 = 5;

/// Upper bound of the vagueness scale.
pub const MAX_VAGUENESS_SCORE: u8 = 10;

/// Timestamp plus free-form diagnostic fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Metadata {
    /// Metadata stamped with the current time.
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    /// Add (or overwrite) a diagnostic field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::now()
    }
}

fn failure_metadata(err: &HuginnError) -> Metadata {
    Metadata::now()
        .with("error", err.kind())
        .with("message", err.to_string())
}

/// Outcome of analysing a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub optimized_prompt: String,
    /// 0 (precise) ..= 10 (very vague).
    pub vagueness_score: u8,
    pub provider: String,
    /// 0.0 ..= 1.0
    pub confidence: f32,
    pub metadata: Metadata,
}

impl AnalysisResult {
    /// Structured failure for an operation that could not complete.
    pub fn failure(err: &HuginnError) -> Self {
        Self {
            success: false,
            issues: vec![err.to_string()],
            suggestions: err.remediation(),
            optimized_prompt: String::new(),
            vagueness_score: DEFAULT_VAGUENESS_SCORE,
            provider: ERROR_PROVIDER.to_string(),
            confidence: 0.0,
            metadata: failure_metadata(err),
        }
    }
}

/// Clarifying questions generated for a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub success: bool,
    pub questions: Vec<String>,
    pub provider: String,
    pub confidence: f32,
    pub metadata: Metadata,
}

impl QuestionResult {
    pub fn failure(err: &HuginnError) -> Self {
        Self {
            success: false,
            questions: Vec::new(),
            provider: ERROR_PROVIDER.to_string(),
            confidence: 0.0,
            metadata: failure_metadata(err).with("suggestions", err.remediation()),
        }
    }

    /// The first question, for UIs that ask one at a time.
    pub fn question(&self) -> Option<&str> {
        self.questions.first().map(String::as_str)
    }
}

/// A rewritten prompt produced from clarifying answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub success: bool,
    pub optimized_prompt: String,
    pub improvements: Vec<String>,
    pub vagueness_score: u8,
    pub provider: String,
    pub confidence: f32,
    pub metadata: Metadata,
}

impl OptimizationResult {
    pub fn failure(err: &HuginnError) -> Self {
        Self {
            success: false,
            optimized_prompt: String::new(),
            improvements: Vec::new(),
            vagueness_score: DEFAULT_VAGUENESS_SCORE,
            provider: ERROR_PROVIDER.to_string(),
            confidence: 0.0,
            metadata: failure_metadata(err).with("suggestions", err.remediation()),
        }
    }
}
