//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `RESTQ_SERVICE_ROOT` is missing, falls back to loading from file
//! 3. Searches several locations for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `RESTQ_SERVICE_ROOT`: Base URL of the service (required)
//! - `RESTQ_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `RESTQ_MAX_RETRY`: Retries after the initial attempt
//! - `RESTQ_RETRY_DELAY_MS`: Delay between attempts in milliseconds
//! - `RESTQ_USER_AGENT`: `User-Agent` header value
//! - `RESTQ_LOG_FILTER`: `EnvFilter` directive
//! - `RESTQ_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./restq.json` or `./restq.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use restq_domain::{ClientConfig, RestqError, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the service root
/// is not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `RestqError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A loaded value fails validation
pub fn load() -> Result<ClientConfig> {
    // Try loading from environment first
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            // Fall back to file
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `RESTQ_SERVICE_ROOT` is required; unset optional variables keep
/// their defaults.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `RestqError::Config` if the service root is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var("RESTQ_SERVICE_ROOT")?);

    if let Some(ms) = env_parse::<u64>("RESTQ_TIMEOUT_MS")? {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(max_retry) = env_parse::<u32>("RESTQ_MAX_RETRY")? {
        config.retry.max_retry = max_retry;
    }
    if let Some(ms) = env_parse::<u64>("RESTQ_RETRY_DELAY_MS")? {
        config.retry.delay = Duration::from_millis(ms);
    }
    if let Ok(agent) = std::env::var("RESTQ_USER_AGENT") {
        config.user_agent = agent;
    }
    if let Ok(filter) = std::env::var("RESTQ_LOG_FILTER") {
        config.logging.filter = filter;
    }
    config.logging.json = env_bool("RESTQ_LOG_JSON", config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches several locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`find_config_file`].
///
/// # Errors
/// Returns `RestqError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A loaded value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RestqError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            RestqError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RestqError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `RestqError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RestqError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RestqError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(RestqError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// File names tried in each directory, in order.
const DIRECT_CANDIDATES: [&str; 4] = ["restq.json", "restq.toml", "config.json", "config.toml"];
const PARENT_CANDIDATES: [&str; 4] =
    ["../config.json", "../config.toml", "../../config.json", "../../config.toml"];

/// Search the standard locations for a configuration file
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./restq.{json,toml}`,
///    `./config.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_file() -> Option<PathBuf> {
    let mut bases = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.push(exe_dir.to_path_buf());
        }
    }

    // Return first existing candidate
    let found = bases.iter().flat_map(|base| candidates_in(base)).find(|path| path.exists());
    found
}

fn candidates_in(base: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    DIRECT_CANDIDATES.iter().chain(PARENT_CANDIDATES.iter()).map(move |name| base.join(name))
}

/// Get required environment variable
///
/// # Errors
/// Returns `RestqError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| RestqError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `RestqError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RestqError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 7] = [
        "RESTQ_SERVICE_ROOT",
        "RESTQ_TIMEOUT_MS",
        "RESTQ_MAX_RETRY",
        "RESTQ_RETRY_DELAY_MS",
        "RESTQ_USER_AGENT",
        "RESTQ_LOG_FILTER",
        "RESTQ_LOG_JSON",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("RESTQ_TEST_BOOL_YES", "YES");
        std::env::set_var("RESTQ_TEST_BOOL_OFF", "off");

        assert!(env_bool("RESTQ_TEST_BOOL_YES", false));
        assert!(!env_bool("RESTQ_TEST_BOOL_OFF", true));

        // Test default when not set
        std::env::remove_var("RESTQ_TEST_BOOL_MISSING");
        assert!(env_bool("RESTQ_TEST_BOOL_MISSING", true));

        // Cleanup
        std::env::remove_var("RESTQ_TEST_BOOL_YES");
        std::env::remove_var("RESTQ_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("RESTQ_SERVICE_ROOT", "https://graph.example.com/v1.0");
        std::env::set_var("RESTQ_TIMEOUT_MS", "1500");
        std::env::set_var("RESTQ_MAX_RETRY", "2");
        std::env::set_var("RESTQ_RETRY_DELAY_MS", "250");
        std::env::set_var("RESTQ_USER_AGENT", "restq-tests");
        std::env::set_var("RESTQ_LOG_FILTER", "restq_core=debug");
        std::env::set_var("RESTQ_LOG_JSON", "true");

        let result = load_from_env();
        assert!(result.is_ok(), "Should load config from env vars, error: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.service_root, "https://graph.example.com/v1.0");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.retry.max_retry, 2);
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert_eq!(config.user_agent, "restq-tests");
        assert_eq!(config.logging.filter, "restq_core=debug");
        assert!(config.logging.json);

        clear_env();
    }

    #[test]
    fn test_load_from_env_defaults_optional_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("RESTQ_SERVICE_ROOT", "https://contoso.sharepoint.com/_api");

        let config = load_from_env().unwrap();
        assert_eq!(config, ClientConfig::new("https://contoso.sharepoint.com/_api"));

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_root() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, RestqError::Config(msg) if msg.contains("RESTQ_SERVICE_ROOT")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("RESTQ_SERVICE_ROOT", "https://graph.example.com/v1.0");
        std::env::set_var("RESTQ_MAX_RETRY", "lots");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, RestqError::Config(msg) if msg.contains("RESTQ_MAX_RETRY")));

        clear_env();
    }

    #[test]
    fn test_parse_config_json() {
        let json_content = r#"{
            "service_root": "https://graph.example.com/v1.0",
            "retry": { "max_retry": 1, "delay": 100 }
        }"#;

        let config = parse_config(json_content, Path::new("test.json")).unwrap();
        assert_eq!(config.retry.max_retry, 1);
        assert_eq!(config.retry.delay, Duration::from_millis(100));
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_content = r#"
service_root = "https://graph.example.com/v1.0"
timeout = 5000

[logging]
filter = "debug"
json = true
"#;

        let config = parse_config(toml_content, Path::new("test.toml")).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.logging.json);
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_candidates_prefer_restq_files() {
        let names: Vec<PathBuf> = candidates_in(Path::new("/etc/app")).collect();
        assert_eq!(names[0], PathBuf::from("/etc/app/restq.json"));
        assert_eq!(names.len(), 8);
    }
}
