//! Scoping engine configuration.

use std::time::Duration;

use thiserror::Error;

use orgscope_directory::{HierarchyFetchError, HttpDirectoryClient};

pub const ENV_DIRECTORY_URL: &str = "ORGSCOPE_DIRECTORY_URL";
pub const ENV_CACHE_TTL_SECS: &str = "ORGSCOPE_CACHE_TTL_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ORGSCOPE_REQUEST_TIMEOUT_SECS";
pub const ENV_DIRECTORY_TOKEN: &str = "ORGSCOPE_DIRECTORY_TOKEN";

const DEFAULT_DIRECTORY_URL: &str = "http://127.0.0.1:8080/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Scoping engine configuration.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    /// Base URL of the directory REST API.
    pub directory_url: String,
    /// How long a hierarchy snapshot stays valid.
    pub cache_ttl: chrono::Duration,
    /// Upper bound on one directory request.
    pub request_timeout: Duration,
    /// Bearer token forwarded to the directory service.
    pub bearer_token: Option<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            cache_ttl: chrono::Duration::minutes(5),
            request_timeout: Duration::from_secs(10),
            bearer_token: None,
        }
    }
}

impl ScopeConfig {
    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Load from `ORGSCOPE_*` environment variables, defaulting what is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, test maps).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        match lookup(ENV_DIRECTORY_URL) {
            Some(url) if !url.trim().is_empty() => config.directory_url = url.trim().to_string(),
            _ => tracing::warn!(
                "{ENV_DIRECTORY_URL} not set; using {DEFAULT_DIRECTORY_URL}"
            ),
        }

        if let Some(secs) = parse_secs(&lookup, ENV_CACHE_TTL_SECS)? {
            config.cache_ttl = chrono::Duration::seconds(i64::from(secs));
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(u64::from(secs));
        }

        config.bearer_token = lookup(ENV_DIRECTORY_TOKEN).filter(|t| !t.trim().is_empty());

        Ok(config)
    }

    /// HTTP directory client configured with this URL, token, and timeout.
    pub fn http_client(&self) -> Result<HttpDirectoryClient, HierarchyFetchError> {
        let client = HttpDirectoryClient::new(&self.directory_url)?.with_timeout(self.request_timeout);
        Ok(match &self.bearer_token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        })
    }
}

fn parse_secs<F>(lookup: &F, var: &'static str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };

    let secs: u32 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.clone(),
    })?;
    if secs == 0 {
        return Err(ConfigError::ZeroDuration(var));
    }
    Ok(Some(secs))
}
