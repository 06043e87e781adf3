use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NAME: &str = "sorrypage";

/// Gate configuration, in the same shape as the `sorrypage` plugin block:
/// `{"enabled": true, "redirectService": "http://sorry:8080/maintenance"}`.
///
/// `Default` yields a disabled gate with no redirect target, which does not
/// pass validation on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SorryPageConfig {
    /// Divert every request to `redirect_service` when set.
    pub enabled: bool,
    /// URL (or bare service host name) of the sorry-page service.
    pub redirect_service: String,
}

impl SorryPageConfig {
    pub fn new(enabled: bool, redirect_service: impl Into<String>) -> Self {
        Self {
            enabled,
            redirect_service: redirect_service.into(),
        }
    }
}

/// Parse and validate a redirect target.
///
/// A value without `://` is a bare service name (e.g. a compose service such
/// as `sorrypage_service`) and is read as `http://<value>`.
pub fn parse_redirect_service(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::EmptyRedirectService);
    }

    let candidate = if raw.contains("://") {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(format!("http://{raw}"))
    };

    let url =
        Url::parse(&candidate).map_err(|e| ConfigError::InvalidRedirectUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::InvalidRedirectUrl(format!(
                "unsupported scheme: {other}"
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidRedirectUrl("missing host".to_string()));
    }

    Ok(url)
}

/// Settings for the standalone `sorrypage-gate` server.
#[derive(Clone)]
pub struct ServerConfig {
    /// The gate itself
    pub sorrypage: SorryPageConfig,
    /// Instance name used in logs
    pub name: String,
    /// Origin that receives traffic while the gate is open
    pub origin_url: Url,
    /// Server port
    pub port: u16,
    /// Upstream connect and per-read timeout (origin and redirect target)
    pub upstream_timeout: Duration,
    /// Bearer token required for /metrics (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("sorrypage", &self.sorrypage)
            .field("name", &self.name)
            .field("origin_url", &self.origin_url.as_str())
            .field("port", &self.port)
            .field("upstream_timeout", &self.upstream_timeout)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = match lookup("SORRYPAGE_ENABLED") {
            Some(v) => parse_bool("SORRYPAGE_ENABLED", &v)?,
            None => false,
        };

        let redirect_service = lookup("SORRYPAGE_REDIRECT_SERVICE")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingRequired("SORRYPAGE_REDIRECT_SERVICE"))?;
        // Fail at startup rather than when the first request is diverted
        parse_redirect_service(&redirect_service)?;

        let origin = lookup("ORIGIN_URL")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingRequired("ORIGIN_URL"))?;
        let origin_url = Url::parse(&origin).map_err(|_| ConfigError::InvalidUrl(origin.clone()))?;

        let port = match lookup("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: v,
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match lookup("UPSTREAM_TIMEOUT_SECS") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "UPSTREAM_TIMEOUT_SECS",
                value: v,
            })?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };

        let name = lookup("SORRYPAGE_NAME")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());

        let metrics_token = lookup("METRICS_TOKEN").filter(|s| !s.is_empty());
        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
        }

        Ok(Self {
            sorrypage: SorryPageConfig::new(enabled, redirect_service),
            name,
            origin_url,
            port,
            upstream_timeout: Duration::from_secs(timeout_secs),
            metrics_token,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("redirectService cannot be empty")]
    EmptyRedirectService,

    #[error("invalid redirect service URL: {0}")]
    InvalidRedirectUrl(String),

    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
