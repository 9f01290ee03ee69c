use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_REFRESH_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Client settings. Passed explicitly to whatever needs them; there is no
/// process-wide instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without trailing slashes.
    pub base_url: String,
    /// Period of the chat poll loop.
    pub refresh_interval: Duration,
    /// Applied to every HTTP request so a hung backend cannot stall a view.
    pub request_timeout: Duration,
    /// Use the in-memory demo backend instead of HTTP.
    pub demo: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_owned(),
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            demo: false,
        }
    }
}

impl ClientConfig {
    /// Reads `TASKY_BACKEND_URL`, `TASKY_CHAT_REFRESH_MS`,
    /// `TASKY_REQUEST_TIMEOUT_SECS` and `TASKY_DEMO`, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("TASKY_BACKEND_URL") {
            config.base_url = normalize_base_url(&url);
        }
        if let Some(raw) = lookup("TASKY_CHAT_REFRESH_MS") {
            config.refresh_interval =
                Duration::from_millis(parse_positive("TASKY_CHAT_REFRESH_MS", &raw)?);
        }
        if let Some(raw) = lookup("TASKY_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_positive("TASKY_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("TASKY_DEMO") {
            config.demo = parse_flag(&raw);
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ClientError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ClientError::Config(format!("{key} must be a positive integer, got {raw:?}")))?;
    if value == 0 {
        return Err(ClientError::Config(format!("{key} must be greater than zero")));
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
