use chrono::NaiveDate;
use lazy_static::lazy_static;
use std::env;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

pub const APOD_API_URL: &str = "https://api.nasa.gov/planetary/apod";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const REQUEST_TIMEOUT_SECS: u64 = 25;
pub const USER_AGENT: &str = "apod-viewer/0.1";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const API_KEY_SIGNUP_URL: &str = "https://api.nasa.gov/";

lazy_static! {
    /// First published APOD entry; nothing earlier exists upstream.
    pub static ref ARCHIVE_START: NaiveDate =
        NaiveDate::from_ymd_opt(1995, 6, 16).unwrap_or(NaiveDate::MIN);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("NASA_API_KEY must be set")]
    MissingApiKey,
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
    #[error("invalid HOST value: {0}")]
    InvalidHost(String),
    #[error("invalid REQUEST_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so callers other than
    /// `from_env` never have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("NASA_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let host_raw = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = host_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_raw.clone()))?;

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => Duration::from_secs(REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            api_key,
            api_url: lookup("APOD_API_URL").unwrap_or_else(|| APOD_API_URL.to_string()),
            host,
            port,
            request_timeout,
        })
    }
}
