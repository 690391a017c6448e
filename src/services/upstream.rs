use bytes::Bytes;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use std::collections::HashMap;
use tracing::info;

use crate::config::{Config, USER_AGENT};
use crate::errors::FetchError;
use crate::services::dates::cache_key;

/// Raw upstream answer, before status or body are interpreted.
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET against the APOD endpoint. `None` means "today", and the date
/// parameter is left off the request.
pub trait ApodUpstream: Send + Sync {
    fn get(&self, date: Option<NaiveDate>) -> BoxFuture<'_, Result<UpstreamResponse, FetchError>>;
}

pub struct HttpUpstream {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpUpstream {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send(&self, date: Option<NaiveDate>) -> Result<UpstreamResponse, FetchError> {
        let mut request = self
            .client
            .get(&self.api_url)
            .query(&[("api_key", self.api_key.as_str()), ("thumbs", "true")]);
        if let Some(date) = date {
            request = request.query(&[("date", cache_key(date))]);
        }

        info!(date = ?date, "Fetching APOD from {}", self.api_url);
        let response = request.send().await.map_err(|e| FetchError::from_transport(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| FetchError::from_transport(&e))?;

        Ok(UpstreamResponse { status, headers, body })
    }
}

impl ApodUpstream for HttpUpstream {
    fn get(&self, date: Option<NaiveDate>) -> BoxFuture<'_, Result<UpstreamResponse, FetchError>> {
        self.send(date).boxed()
    }
}
