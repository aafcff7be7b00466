//! # Restq Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The reqwest-backed `Transport` and its HTTP client
//! - Access token providers
//! - Configuration loading from the environment and JSON/TOML files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `restq-core`
//! - Depends on `restq-domain` and `restq-core`
//! - Contains all "impure" code (network, environment, filesystem)

use std::sync::Arc;

use restq_core::ClientContext;
use restq_domain::{ClientConfig, Result};

pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;

// Re-export commonly used items
pub use auth::{AccessTokenProvider, EnvTokenProvider, StaticTokenProvider};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, HttpTransport};

/// Build a client context that talks HTTP to `config.service_root`.
///
/// The context's default retry options come from `config.retry`.
///
/// # Errors
/// Returns `RestqError::Config` if the configuration fails validation or the
/// HTTP client cannot be built.
pub fn connect(
    config: &ClientConfig,
    auth: Option<Arc<dyn AccessTokenProvider>>,
) -> Result<Arc<ClientContext>> {
    config.validate()?;
    let transport = HttpTransport::new(config, auth)?;
    tracing::info!(service_root = %transport.service_root(), "Client context created");
    Ok(ClientContext::builder(Arc::new(transport)).retry_settings(config.retry).build())
}
