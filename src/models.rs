use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER};
use crate::services::ApodService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    #[serde(other)]
    Other,
}

/// One day's record as returned by the APOD API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApodRecord {
    pub date: String,
    pub title: String,
    pub explanation: String,
    #[serde(default)]
    pub url: Option<String>,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdurl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
}

/// Last limit/remaining counters reported by the upstream. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl RateLimitSnapshot {
    /// Applies whichever rate-limit headers are present. Header names must be
    /// lowercase. Returns true if anything changed.
    pub fn observe(&mut self, headers: &HashMap<String, String>, at: DateTime<Utc>) -> bool {
        let parse = |name: &str| headers.get(name).and_then(|v| v.trim().parse::<u32>().ok());
        let limit = parse(RATE_LIMIT_LIMIT_HEADER);
        let remaining = parse(RATE_LIMIT_REMAINING_HEADER);

        if limit.is_none() && remaining.is_none() {
            return false;
        }
        if limit.is_some() {
            self.limit = limit;
        }
        if remaining.is_some() {
            self.remaining = remaining;
        }
        self.observed_at = Some(at);
        true
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: ApodService,
}

impl AppState {
    pub fn new(service: ApodService) -> Self {
        Self { service }
    }
}
