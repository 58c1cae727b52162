//! Configuration loading for the `huginn` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag or `HUGINN_CONFIG`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//! 4. built-in defaults: one local Ollama provider
//!
//! ```toml
//! [assistant]
//! min_prompt_length = 3
//! operation_timeout_secs = 60
//!
//! [cache]
//! ttl_secs = 1800
//! max_sessions = 5
//!
//! [[providers]]
//! kind = "ollama"
//! name = "local"
//! model = "llama3.2"
//! priority = 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::SessionCacheConfig;
use crate::host::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL, OllamaHost};
use crate::providers::{ProviderDescriptor, RetryConfig};
use crate::service::PromptLimits;
use crate::{HuginnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    /// Providers to register. Defaults to one local Ollama provider.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assistant: AssistantConfig::default(),
            cache: CacheSection::default(),
            retry: RetrySection::default(),
            providers: default_providers(),
        }
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::Ollama(OllamaProviderConfig::default())]
}

/// Orchestrator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// Minimum prompt length in characters (default: 3).
    #[serde(default = "default_min_prompt_length")]
    pub min_prompt_length: usize,
    /// Maximum prompt length in characters (default: 5000).
    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,
    /// Per-operation timeout in seconds (default: 60).
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            min_prompt_length: default_min_prompt_length(),
            max_prompt_length: default_max_prompt_length(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

fn default_min_prompt_length() -> usize {
    3
}

fn default_max_prompt_length() -> usize {
    5000
}

fn default_operation_timeout() -> u64 {
    60
}

impl AssistantConfig {
    pub fn limits(&self) -> PromptLimits {
        PromptLimits::new()
            .min_prompt_length(self.min_prompt_length)
            .max_prompt_length(self.max_prompt_length)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Session cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Session time-to-live in seconds (default: 1800).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Maximum cached sessions (default: 5).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Sweep interval in seconds (default: 300).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_sessions: default_max_sessions(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    30 * 60
}

fn default_max_sessions() -> usize {
    5
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

impl CacheSection {
    pub fn session_cache_config(&self) -> SessionCacheConfig {
        SessionCacheConfig::new()
            .ttl(Duration::from_secs(self.ttl_secs))
            .max_sessions(self.max_sessions)
            .sweep_interval(Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Retry settings for prompt calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Attempts including the first (default: 2).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    5000
}

impl RetrySection {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

/// One provider entry, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama(OllamaProviderConfig),
}

/// A provider backed by an Ollama server.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaProviderConfig {
    /// Provider name (default: "ollama").
    #[serde(default = "default_ollama_name")]
    pub name: String,
    /// Lower is tried first (default: 0).
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// HTTP request timeout in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Overrides the provider's session TTL.
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,
    /// Overrides the provider's session capacity.
    #[serde(default)]
    pub max_sessions: Option<usize>,
    /// Recorded on the descriptor; not used for selection.
    #[serde(default)]
    pub fallback_to: Option<String>,
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            name: default_ollama_name(),
            priority: 0,
            base_url: default_ollama_url(),
            model: default_ollama_model(),
            request_timeout_secs: None,
            session_ttl_secs: None,
            max_sessions: None,
            fallback_to: None,
        }
    }
}

fn default_ollama_name() -> String {
    "ollama".to_string()
}

fn default_ollama_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ollama_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl OllamaProviderConfig {
    pub fn descriptor(&self) -> ProviderDescriptor {
        let mut descriptor = ProviderDescriptor::new(&self.name, self.priority);
        if let Some(ttl) = self.session_ttl_secs {
            descriptor = descriptor.session_ttl(Duration::from_secs(ttl));
        }
        if let Some(max) = self.max_sessions {
            descriptor = descriptor.max_sessions(max);
        }
        if let Some(fallback) = &self.fallback_to {
            descriptor = descriptor.fallback_to(fallback);
        }
        descriptor
    }

    pub fn host(&self) -> OllamaHost {
        let host = OllamaHost::with_base_url(&self.base_url, &self.model);
        match self.request_timeout_secs {
            Some(secs) => host.request_timeout(Duration::from_secs(secs)),
            None => host,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    /// 4. [`Config::default()`]
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        content.parse().map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Resolve the config file path, if any file exists.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

impl std::str::FromStr for Config {
    type Err = HuginnError;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))
    }
}
