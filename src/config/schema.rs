//! Configuration schema for fintrack
//!
//! Configuration is stored at `~/.config/fintrack/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// API endpoints and transport
    pub api: ApiConfig,

    /// Session handling
    pub session: SessionConfig,

    /// Balance cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// API endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL for business endpoints
    pub base_url: String,

    /// Base URL for `/api/auth/*` endpoints
    pub auth_base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            auth_base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Login entry point used when the session cannot be renewed
    pub login_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_url: "http://localhost:3000/login".to_string(),
        }
    }
}

/// Balance cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep resolved balances on disk across runs (default: true)
    pub persist: bool,

    /// Override for the cache directory
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist: true,
            dir: None,
        }
    }
}
