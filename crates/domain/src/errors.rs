//! Error types used throughout the client

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for restq
///
/// Errors raised while flushing the pending queue fail the whole batch; the
/// queue is left untouched so the caller (or the retry controller) can try
/// again.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum RestqError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} from {address}: {message}")]
    Http { status: u16, address: String, message: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Retry attempts exhausted after {attempts} tries: {last}")]
    RetryExhausted { attempts: u32, last: Box<RestqError> },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping of [`RestqError`] variants, used for logging fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Transport,
    Protocol,
    Security,
    Configuration,
    State,
    Internal,
}

impl ErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Security => "security",
            Self::Configuration => "configuration",
            Self::State => "state",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RestqError {
    pub fn http(status: u16, address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Http { status, address: address.into(), message: message.into() }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Http { .. } => ErrorCategory::Transport,
            Self::Deserialization(_) | Self::Serialization(_) => ErrorCategory::Protocol,
            Self::Auth(_) => ErrorCategory::Security,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::InvalidState(_) => ErrorCategory::State,
            Self::RetryExhausted { last, .. } => last.category(),
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether resending the same batch could plausibly succeed.
    ///
    /// Server errors, throttling and request timeouts are transient; other
    /// client errors and protocol failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Number of attempts made before this error surfaced (1 unless the
    /// retry controller gave up).
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetryExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// The innermost error, unwrapping retry exhaustion.
    pub fn root_cause(&self) -> &RestqError {
        match self {
            Self::RetryExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for RestqError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

/// Result type alias for restq operations
pub type Result<T> = std::result::Result<T, RestqError>;
