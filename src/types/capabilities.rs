//! Provider capability declarations

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A kind of operation a provider declares it can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Prompt analysis (issues, suggestions, vagueness score).
    Analysis,
    /// Clarifying-question generation.
    Questions,
    /// Prompt optimization from clarifying answers.
    Optimization,
    /// Analysis enriched with page context.
    ContextAnalysis,
    /// Incremental (streamed) responses.
    Streaming,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Analysis => "analysis",
            Capability::Questions => "questions",
            Capability::Optimization => "optimization",
            Capability::ContextAnalysis => "context_analysis",
            Capability::Streaming => "streaming",
        }
    }

    /// Every operation kind the orchestrator exposes.
    pub fn all() -> BTreeSet<Capability> {
        BTreeSet::from([
            Capability::Analysis,
            Capability::Questions,
            Capability::Optimization,
            Capability::ContextAnalysis,
            Capability::Streaming,
        ])
    }
}
