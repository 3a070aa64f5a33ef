//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Remote posts API
    #[serde(default)]
    pub api: RawApiConfig,

    /// Query cache freshness
    #[serde(default)]
    pub cache: RawCacheConfig,

    /// Retry policy for reads
    #[serde(default)]
    pub retry: RawRetryConfig,

    /// Login attempt limiter
    #[serde(default)]
    pub login: RawLoginConfig,

    /// Table view defaults
    #[serde(default)]
    pub table: RawTableConfig,

    /// Local storage
    #[serde(default)]
    pub storage: RawStorageConfig,

    /// Accounts allowed to log in
    #[serde(default)]
    pub accounts: Vec<RawAccount>,
}

/// Remote API settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawApiConfig {
    /// Base URL of the posts collection (default: jsonplaceholder)
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_seconds: Option<u64>,
}

/// Cache settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCacheConfig {
    /// How long a fetched list stays fresh, in seconds
    pub stale_seconds: Option<u64>,
}

/// Retry settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRetryConfig {
    /// Retries after the first failed read
    pub max_retries: Option<u32>,

    /// Delay before the first retry, doubled for each further retry
    pub base_delay_ms: Option<u64>,
}

/// Login limiter settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLoginConfig {
    pub max_attempts: Option<u32>,

    /// Sliding window width in seconds
    pub window_seconds: Option<u64>,

    /// Cooldown once blocked, in seconds (defaults to the window)
    pub block_seconds: Option<u64>,
}

/// Table view settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTableConfig {
    pub page_size: Option<usize>,
}

/// Storage settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStorageConfig {
    /// Data directory for the session and audit database
    pub data_dir: Option<PathBuf>,
}

/// Raw account definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawAccount {
    pub username: String,
    pub password: String,

    /// "viewer" or "editor"
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "viewer".to_string()
}
