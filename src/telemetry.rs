//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "ollama"), or "error" for failed operations
//! - `operation`: orchestrator operation (e.g. "analyze", "questions", "optimize")
//! - `status`: outcome: "ok" or "error"

/// Total orchestrator operations.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const OPERATIONS_TOTAL: &str = "huginn_operations_total";

/// Operation duration in seconds.
///
/// Labels: `operation`.
pub const OPERATION_DURATION_SECONDS: &str = "huginn_operation_duration_seconds";

/// Availability probes issued during provider selection.
///
/// Labels: `provider`, `availability` ("ready" | "downloading" | "unavailable").
pub const PROVIDER_PROBES_TOTAL: &str = "huginn_provider_probes_total";

/// Session cache lookups served from a valid record.
pub const SESSION_CACHE_HITS_TOTAL: &str = "huginn_session_cache_hits_total";

/// Session cache lookups that required (or joined) a creation.
pub const SESSION_CACHE_MISSES_TOTAL: &str = "huginn_session_cache_misses_total";

/// Session records removed from the cache.
///
/// Labels: `reason` ("expired" | "capacity" | "teardown").
pub const SESSION_EVICTIONS_TOTAL: &str = "huginn_session_evictions_total";

/// Session creations started by the cache.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const SESSION_CREATIONS_TOTAL: &str = "huginn_session_creations_total";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";
