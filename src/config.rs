use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub timeout: Duration,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("EVENTYPOP_API_URL")
            .or_else(|| lookup("AGENDA_API_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = match lookup("EVENTYPOP_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw).ok_or(ConfigError::Invalid("EVENTYPOP_TIMEOUT_SECS"))?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let log_json = lookup("EVENTYPOP_LOG_JSON")
            .map(|value| value == "1")
            .unwrap_or(false);

        Ok(Self {
            base_url,
            timeout,
            log_json,
        })
    }
}

/// Whole seconds, greater than zero.
pub fn parse_timeout(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable: {0}")]
    Invalid(&'static str),
}
