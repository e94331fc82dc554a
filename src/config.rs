//! Client configuration, read once at startup from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub const SESSION_FILE: &str = "auth-storage.json";
pub const LOG_FILE: &str = "client.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid FINANCE_API_URL {value:?}: {reason}")]
    InvalidApiUrl { value: String, reason: String },
    #[error("Invalid FINANCE_HTTP_TIMEOUT_SECS {0:?}")]
    InvalidTimeout(String),
    #[error("No data directory available, set FINANCE_DATA_DIR")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, fixed for the lifetime of the process
    pub api_url: Url,
    /// Directory holding the persisted session and the log file
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("FINANCE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&api_url)?;

        let data_dir = match env::var_os("FINANCE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("finance-tracker"),
        };

        let request_timeout = match env::var("FINANCE_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidTimeout(raw))?,
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            data_dir,
            request_timeout,
        })
    }

    /// Configuration pointing at an explicit backend, everything else defaulted.
    pub fn with_api_url(api_url: &str, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            data_dir: data_dir.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

/// Parses the base URL and normalises it to end with `/`, so that joining
/// relative endpoint paths keeps any path prefix (e.g. `https://host/api/`).
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash).map_err(|err| ConfigError::InvalidApiUrl {
        value: raw.to_string(),
        reason: err.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiUrl {
            value: raw.to_string(),
            reason: "scheme must be http or https".into(),
        });
    }
    Ok(url)
}
