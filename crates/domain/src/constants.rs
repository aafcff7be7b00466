//! Domain constants
//!
//! Defaults shared by configuration parsing and the retry controller.

// Retry controller defaults
pub const DEFAULT_MAX_RETRY: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

// Transport defaults
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_USER_AGENT: &str = concat!("restq/", env!("CARGO_PKG_VERSION"));

// Logging defaults
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Key of the envelope servers wrap collections and scalar results in.
pub const VALUE_ENVELOPE_KEY: &str = "value";
