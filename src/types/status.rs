//! Introspection snapshots

use serde::{Deserialize, Serialize};

use super::Capability;

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Name of the cached active provider, if one has been selected.
    pub active_provider: Option<String>,
    /// Registered providers in selection order.
    pub providers: Vec<ProviderStatus>,
    pub cache: CacheStats,
    /// Operation kinds at least one registered provider can serve.
    pub features: Vec<String>,
}

/// Descriptor summary for one registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    pub priority: u32,
    pub capabilities: Vec<Capability>,
    pub requires_auth: bool,
    /// Provider to fall back to when this one fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_to: Option<String>,
    pub active: bool,
}

/// Session cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Records currently held.
    pub count: usize,
    /// Maximum number of records.
    pub capacity: usize,
    /// Creations currently in flight.
    pub in_flight: usize,
    pub ttl_ms: u64,
    pub entries: Vec<SessionStats>,
}

/// One cached session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Abbreviated session key.
    pub key: String,
    pub provider: String,
    pub age_ms: u64,
    pub valid: bool,
}
