//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SKILLNET_API_BASE_URL` - REST API base (default: `http://localhost:8080/api`)
//! - `SKILLNET_OAUTH_BASE_URL` - Host serving `/oauth2/authorization/{provider}`
//!   (default: `http://localhost:8080`)
//! - `SKILLNET_OAUTH_REDIRECT_URI` - Where the provider flow returns to
//!   (default: `http://localhost:5173/oauth2/redirect`)
//! - `SKILLNET_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `SKILLNET_FOLLOW_SETTLE_MS` - Delay before reconciling a follow toggle (default: 500)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_OAUTH_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_OAUTH_REDIRECT_URI: &str = "http://localhost:5173/oauth2/redirect";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_FOLLOW_SETTLE_MS: u64 = 500;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// SkillNet client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every REST path is joined onto. Always ends with `/`.
    pub api_base_url: Url,
    /// Host serving the OAuth authorization redirects.
    pub oauth_base_url: Url,
    /// Callback URL handed to the OAuth flow.
    pub oauth_redirect_uri: String,
    /// Timeout applied to each remote call.
    pub request_timeout: Duration,
    /// Delay between a successful follow toggle and its reconciliation fetch.
    pub follow_settle_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: base_url(DEFAULT_API_BASE_URL),
            oauth_base_url: base_url(DEFAULT_OAUTH_BASE_URL),
            oauth_redirect_uri: DEFAULT_OAUTH_REDIRECT_URI.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            follow_settle_delay: Duration::from_millis(DEFAULT_FOLLOW_SETTLE_MS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_url(
            "SKILLNET_API_BASE_URL",
            &get_env_or_default("SKILLNET_API_BASE_URL", DEFAULT_API_BASE_URL),
        )?;
        let oauth_base_url = parse_url(
            "SKILLNET_OAUTH_BASE_URL",
            &get_env_or_default("SKILLNET_OAUTH_BASE_URL", DEFAULT_OAUTH_BASE_URL),
        )?;
        let oauth_redirect_uri =
            get_env_or_default("SKILLNET_OAUTH_REDIRECT_URI", DEFAULT_OAUTH_REDIRECT_URI);
        Url::parse(&oauth_redirect_uri).map_err(|e| {
            ConfigError::InvalidEnvVar("SKILLNET_OAUTH_REDIRECT_URI".to_string(), e.to_string())
        })?;

        let request_timeout = Duration::from_secs(parse_u64(
            "SKILLNET_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let follow_settle_delay = Duration::from_millis(parse_u64(
            "SKILLNET_FOLLOW_SETTLE_MS",
            DEFAULT_FOLLOW_SETTLE_MS,
        )?);

        Ok(Self {
            api_base_url,
            oauth_base_url,
            oauth_redirect_uri,
            request_timeout,
            follow_settle_delay,
        })
    }

    /// Config pointing every URL at `api_base_url`, with defaults elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn with_api_base_url(api_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_url("api_base_url", api_base_url)?,
            ..Self::default()
        })
    }
}

/// Parse a base URL and make sure relative joins keep its path.
fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "URL cannot be used as a base".to_string(),
        ));
    }
    Ok(url)
}

fn base_url(raw: &str) -> Url {
    #[allow(clippy::expect_used)]
    Url::parse(&format!("{raw}/")).expect("default URL constants are valid")
}

fn parse_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
