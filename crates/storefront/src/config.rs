//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIENDA_API_BASE_URL` - Base URL of the storefront REST backend
//!
//! ## Optional
//! - `TIENDA_STORAGE_PATH` - File used to persist the credential (default: in-memory)
//! - `TIENDA_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `TIENDA_CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `TIENDA_USER_AGENT` - User agent sent to the backend (default: Tienda/1.0)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_USER_AGENT: &str = "Tienda/1.0";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend (paths such as `/carrito` are joined to it)
    pub api_base_url: Url,
    /// Where the credential is persisted; `None` keeps it in memory only
    pub storage_path: Option<PathBuf>,
    /// Timeout applied to every backend request
    pub http_timeout: Duration,
    /// Lifetime of cached catalog responses
    pub catalog_cache_ttl: Duration,
    /// User agent header value
    pub user_agent: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<SecretString>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the backend URL.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            storage_path: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the backend URL is missing or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("TIENDA_API_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("TIENDA_API_BASE_URL".to_string()))?;
        let api_base_url = parse_base_url(&raw_url)?;

        let mut config = Self::new(api_base_url);
        config.storage_path = lookup("TIENDA_STORAGE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        config.http_timeout = Duration::from_secs(parse_secs(
            &lookup,
            "TIENDA_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        config.catalog_cache_ttl = Duration::from_secs(parse_secs(
            &lookup,
            "TIENDA_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?);
        if let Some(agent) = lookup("TIENDA_USER_AGENT") {
            config.user_agent = agent;
        }
        config.sentry_dsn = lookup("SENTRY_DSN")
            .filter(|dsn| !dsn.is_empty())
            .map(SecretString::from);
        config.sentry_environment = lookup("SENTRY_ENVIRONMENT");

        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the backend URL, forcing a trailing slash so relative joins keep
/// any path prefix (`https://host/tienda/` + `carrito`).
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| {
        ConfigError::InvalidEnvVar("TIENDA_API_BASE_URL".to_string(), e.to_string())
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "TIENDA_API_BASE_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse a whole number of seconds with a default.
fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
