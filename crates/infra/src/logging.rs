//! Tracing subscriber initialization
//!
//! Libraries in this workspace only emit `tracing` events. Binaries and
//! tests that want output call [`init`] once.

use restq_domain::{LoggingConfig, RestqError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `RUST_LOG` when set, else the configured directive.
///
/// # Errors
/// Returns `RestqError::Config` if the configured directive does not parse.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter)
        .map_err(|e| RestqError::Config(format!("Invalid log filter '{}': {}", config.filter, e)))
}

/// Install a global subscriber: human-readable, or JSON lines when
/// `config.json` is set.
///
/// # Errors
/// Returns `RestqError::Config` for a bad filter or when a global subscriber
/// is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(config)?);

    let installed = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    installed
        .map_err(|e| RestqError::Config(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_directive_builds_filter() {
        let config = LoggingConfig { filter: "restq_core=debug,info".into(), json: false };
        assert!(filter(&config).is_ok());
    }

    #[test]
    fn second_init_fails() {
        let config = LoggingConfig { filter: "warn".into(), json: true };
        // Another test may have installed one already, so only the second call is checked
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
