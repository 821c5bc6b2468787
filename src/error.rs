//! Error types for fintrack
//!
//! All modules use `FintrackResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fintrack operations
pub type FintrackResult<T> = Result<T, FintrackError>;

/// All errors that can occur in fintrack
#[derive(Error, Debug)]
pub enum FintrackError {
    // Transport errors
    #[error("Network error contacting {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // Session errors
    #[error("Session expired. Please log in again")]
    SessionExpired,

    #[error("Authentication failed")]
    AuthFailed,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl FintrackError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status code, if the exchange completed with a non-success status
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the server rejected the session (HTTP 401)
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if the error ends the current session
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::AuthFailed)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::SessionExpired | Self::AuthFailed => {
                Some("Sign in again through the login page, then retry")
            }
            Self::Network { .. } => Some("Check that api.base_url points at a running server"),
            Self::Timeout { .. } => Some("Raise api.timeout_secs or check server health"),
            Self::ConfigInvalid { .. } => Some("Run: fintrack config init --force"),
            _ => None,
        }
    }
}
