use chrono::NaiveDate;
use hyper::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::ARCHIVE_START;

pub const RATE_LIMITED_MESSAGE: &str = "The NASA API rate limit has been reached. \
     Register for your own free API key at https://api.nasa.gov/ and try again.";
pub const SERVER_ERROR_MESSAGE: &str =
    "NASA's APOD service is having trouble right now. Please try again later.";
pub const TIMEOUT_MESSAGE: &str = "The request to NASA timed out. Please try again later.";
pub const DEFAULT_FETCH_MESSAGE: &str = "Failed to fetch the Astronomy Picture of the Day";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid date format. Please use YYYY-MM-DD.")]
    Format,
    #[error("Date must be between {start} and {today}.", start = *ARCHIVE_START)]
    Range { today: NaiveDate },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Format => "FORMAT_ERROR",
            Self::Range { .. } => "RANGE_ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    RateLimited,
    ServerError,
    Timeout,
    Other,
}

impl FetchErrorKind {
    pub fn for_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            s if s >= 500 => Self::ServerError,
            _ => Self::Other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited => "RATE_LIMITED",
            Self::ServerError => "SERVER_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Other => "OTHER",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ServerError | Self::Other => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A failed upstream call. Cloneable so a single failure can be handed to
/// every caller waiting on the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{detail}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub status: Option<u16>,
    pub provider_code: Option<String>,
    pub provider_message: Option<String>,
    pub body: Option<String>,
    pub detail: String,
}

// NASA answers errors in two shapes: {"code": 400, "msg": "..."} from the APOD
// service itself and {"error": {"code": "...", "message": "..."}} from the
// api.nasa.gov gateway.
#[derive(Deserialize)]
struct ProviderErrorBody {
    code: Option<serde_json::Value>,
    msg: Option<String>,
    error: Option<ProviderErrorInner>,
}

#[derive(Deserialize)]
struct ProviderErrorInner {
    code: Option<String>,
    message: Option<String>,
}

impl FetchError {
    fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            provider_code: None,
            provider_message: None,
            body: None,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, detail)
    }

    pub fn other(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Other, detail)
    }

    /// Builds the error for a non-2xx upstream response.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).trim().to_string();
        let mut err = Self::new(
            FetchErrorKind::for_status(status),
            format!("upstream returned HTTP {}", status),
        );
        err.status = Some(status);

        if let Ok(parsed) = serde_json::from_slice::<ProviderErrorBody>(body) {
            let (inner_code, inner_message) = match parsed.error {
                Some(inner) => (inner.code, inner.message),
                None => (None, None),
            };
            err.provider_code = inner_code.or_else(|| {
                parsed.code.map(|c| match c {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
            });
            err.provider_message = inner_message.or(parsed.msg).filter(|m| !m.is_empty());
        }
        if !text.is_empty() {
            err.body = Some(text);
        }
        err
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return Self::timeout(err.to_string());
        }
        match err.status() {
            Some(status) => {
                let mut fetch_err = Self::new(FetchErrorKind::for_status(status.as_u16()), err.to_string());
                fetch_err.status = Some(status.as_u16());
                fetch_err
            }
            None => Self::other(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] FetchError),
}

impl warp::reject::Reject for AppError {}

/// Context recorded for a normalized upstream failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: FetchErrorKind,
    pub status: Option<u16>,
    pub provider_code: Option<String>,
    pub body: Option<String>,
    pub detail: String,
}

impl LogRecord {
    pub fn emit(&self) {
        match self.kind {
            FetchErrorKind::RateLimited | FetchErrorKind::Timeout => warn!(
                kind = self.kind.code(),
                status = ?self.status,
                provider_code = ?self.provider_code,
                body = ?self.body,
                "APOD upstream call failed: {}",
                self.detail
            ),
            FetchErrorKind::ServerError | FetchErrorKind::Other => error!(
                kind = self.kind.code(),
                status = ?self.status,
                provider_code = ?self.provider_code,
                body = ?self.body,
                "APOD upstream call failed: {}",
                self.detail
            ),
        }
    }
}

/// Maps an upstream failure to the message shown to the user and the record
/// to log. Has no side effects; call `LogRecord::emit` to log.
pub fn classify(err: &FetchError, default_message: &str) -> (String, LogRecord) {
    let message = match err.kind {
        FetchErrorKind::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
        FetchErrorKind::ServerError => SERVER_ERROR_MESSAGE.to_string(),
        FetchErrorKind::Timeout => TIMEOUT_MESSAGE.to_string(),
        FetchErrorKind::Other => match &err.provider_message {
            Some(provider_message) => provider_message.clone(),
            None => format!("{}: {}", default_message, err.detail),
        },
    };

    let record = LogRecord {
        kind: err.kind,
        status: err.status,
        provider_code: err.provider_code.clone(),
        body: err.body.clone(),
        detail: err.detail.clone(),
    };
    (message, record)
}
