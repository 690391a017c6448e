use bytes::Bytes;
use chrono::{NaiveDate, TimeZone, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::FetchError;
use crate::services::{ApodService, ApodUpstream, FixedClock, UpstreamResponse};

type Responder = Box<dyn Fn(Option<NaiveDate>) -> Result<UpstreamResponse, FetchError> + Send + Sync>;

/// Upstream stand-in that counts calls and records requested dates.
pub(crate) struct FakeUpstream {
    respond: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requested: Mutex<Vec<Option<NaiveDate>>>,
}

impl FakeUpstream {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(Option<NaiveDate>) -> Result<UpstreamResponse, FetchError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: None,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with a record for `provider_date`, or for the
    /// requested date when one is given.
    pub(crate) fn serving(provider_date: &'static str) -> Self {
        Self::new(move |date| {
            let date = date.map(|d| d.to_string()).unwrap_or_else(|| provider_date.to_string());
            Ok(ok_response(&date))
        })
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<Option<NaiveDate>> {
        self.requested.lock().unwrap().clone()
    }
}

impl ApodUpstream for FakeUpstream {
    fn get(&self, date: Option<NaiveDate>) -> BoxFuture<'_, Result<UpstreamResponse, FetchError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(date);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.respond)(date)
        }
        .boxed()
    }
}

pub(crate) fn record_json(date: &str) -> String {
    serde_json::json!({
        "date": date,
        "title": format!("Picture for {}", date),
        "explanation": "A galaxy far away.",
        "url": format!("https://apod.nasa.gov/apod/image/{}.jpg", date),
        "hdurl": format!("https://apod.nasa.gov/apod/image/{}_hd.jpg", date),
        "media_type": "image",
        "service_version": "v1"
    })
    .to_string()
}

pub(crate) fn ok_response(date: &str) -> UpstreamResponse {
    UpstreamResponse {
        status: 200,
        headers: HashMap::new(),
        body: Bytes::from(record_json(date)),
    }
}

pub(crate) fn status_response(status: u16, body: &str) -> UpstreamResponse {
    UpstreamResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

/// Service whose clock reads 2026-10-17 12:00 UTC.
pub(crate) fn service_with(upstream: Arc<FakeUpstream>) -> ApodService {
    let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
    ApodService::new(upstream, Arc::new(FixedClock(now)))
}
