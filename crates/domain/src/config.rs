//! Client configuration structures
//!
//! Loaded by `restq_infra::config` from the environment or a JSON/TOML file.
//! Every field except `service_root` has a default, so a minimal file only
//! names the service root.

use std::time::Duration;

use restq_common::duration_millis;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_RETRY, DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_MS,
    DEFAULT_USER_AGENT,
};
use crate::errors::{RestqError, Result};

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every resource path is resolved against
    pub service_root: String,
    /// Per-request timeout
    #[serde(with = "duration_millis", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    pub fn new(service_root: impl Into<String>) -> Self {
        Self {
            service_root: service_root.into(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            retry: RetrySettings::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Check the values a loader cannot enforce through types alone.
    ///
    /// # Errors
    /// Returns `RestqError::Config` when the service root is empty or not an
    /// http(s) URL, or when the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let root = self.service_root.trim();
        if root.is_empty() {
            return Err(RestqError::Config("service_root must not be empty".to_string()));
        }
        if !(root.starts_with("http://") || root.starts_with("https://")) {
            return Err(RestqError::Config(format!(
                "service_root must be an http(s) URL, got '{root}'"
            )));
        }
        if self.timeout.is_zero() {
            return Err(RestqError::Config("timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Settings for `execute_query_retry` when the caller does not pass any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the initial attempt
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// Fixed delay between attempts
    #[serde(with = "duration_millis", default = "default_retry_delay")]
    pub delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retry: default_max_retry(), delay: default_retry_delay() }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `restq_core=debug,info`
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter(), json: false }
    }
}

fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT_MS)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_retry() -> u32 {
    DEFAULT_MAX_RETRY
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_RETRY_DELAY_MS)
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"service_root":"https://api.example.com/v1.0"}"#).unwrap();

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retry, 5);
        assert_eq!(config.retry.delay, Duration::from_secs(5));
        assert_eq!(config.logging.filter, "info");
        assert!(!config.logging.json);
        assert!(config.user_agent.starts_with("restq/"));
    }

    #[test]
    fn test_toml_overrides() {
        let config: ClientConfig = toml::from_str(
            r#"
            service_root = "https://tenant.example.com/_api"
            timeout = 1500

            [retry]
            max_retry = 2
            delay = 250

            [logging]
            filter = "restq_core=debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.retry, RetrySettings { max_retry: 2, delay: Duration::from_millis(250) });
        assert_eq!(config.logging.filter, "restq_core=debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::new("https://api.example.com").validate().is_ok());
        assert!(ClientConfig::new("  ").validate().is_err());
        assert!(ClientConfig::new("ftp://api.example.com").validate().is_err());

        let mut config = ClientConfig::new("http://localhost:8080");
        config.timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(RestqError::Config(_))));
    }
}
