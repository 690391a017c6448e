use chrono::{DateTime, NaiveDate, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::FetchError;
use crate::models::{ApodRecord, RateLimitSnapshot};

pub mod cache;
pub mod clock;
pub mod dates;
pub mod upstream;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use cache::ApodCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dates::{cache_key, random_date, validate_date};
pub use upstream::{ApodUpstream, HttpUpstream, UpstreamResponse};

type FetchResult = Result<Arc<ApodRecord>, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct Inner {
    cache: ApodCache,
    rate_limit: RwLock<RateLimitSnapshot>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    upstream: Arc<dyn ApodUpstream>,
    clock: Arc<dyn Clock>,
}

/// Fetch-and-cache front for the APOD upstream. Cloning is cheap and every
/// clone shares the same cache, rate-limit snapshot and in-flight requests.
#[derive(Clone)]
pub struct ApodService {
    inner: Arc<Inner>,
}

impl ApodService {
    pub fn new(upstream: Arc<dyn ApodUpstream>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: ApodCache::new(),
                rate_limit: RwLock::new(RateLimitSnapshot::default()),
                in_flight: Mutex::new(HashMap::new()),
                upstream,
                clock,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let upstream = HttpUpstream::new(config)?;
        Ok(Self::new(Arc::new(upstream), Arc::new(SystemClock)))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.inner.clock.today()
    }

    pub fn random_date(&self) -> NaiveDate {
        random_date(self.now())
    }

    pub async fn rate_limit(&self) -> RateLimitSnapshot {
        *self.inner.rate_limit.read().await
    }

    pub async fn cached(&self, key: &str) -> Option<Arc<ApodRecord>> {
        self.inner.cache.get(key).await
    }

    pub async fn cache_len(&self) -> usize {
        self.inner.cache.len().await
    }

    /// Returns the record for `date` (today when `None`), from cache when
    /// possible. Concurrent misses for the same key share one upstream call.
    /// Failures are returned to every waiter and are not cached.
    pub async fn fetch(&self, date: Option<NaiveDate>) -> FetchResult {
        let key = cache_key(date.unwrap_or_else(|| self.today()));
        if let Some(record) = self.inner.cache.get(&key).await {
            debug!(key = %key, "APOD cache hit");
            return Ok(record);
        }

        let flight = {
            let mut in_flight = self.inner.in_flight.lock().await;
            // A flight may have finished between the cache check and the lock.
            if let Some(record) = self.inner.cache.get(&key).await {
                return Ok(record);
            }
            match in_flight.get(&key) {
                Some(flight) => {
                    debug!(key = %key, "joining in-flight APOD request");
                    flight.clone()
                }
                None => {
                    let flight = self.start_flight(key.clone(), date);
                    in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Runs the load on its own task so it completes, caches and leaves the
    /// in-flight map even when every waiter has gone away.
    fn start_flight(&self, key: String, date: Option<NaiveDate>) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.load(&key, date).await;
            inner.in_flight.lock().await.remove(&key);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(FetchError::other(format!("APOD fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared()
    }

    #[cfg(test)]
    pub(crate) async fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }
}

impl Inner {
    async fn load(&self, key: &str, date: Option<NaiveDate>) -> FetchResult {
        let response = self.upstream.get(date).await?;
        self.observe_rate_limit(&response.headers).await;

        if !response.is_success() {
            return Err(FetchError::from_response(response.status, &response.body));
        }

        let record: ApodRecord = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::other(format!("invalid APOD response: {}", e)))?;

        // The provider may answer "today" with a different day than ours when
        // its clock sits in another timezone; keep both keys pointing at it.
        let record = self.cache.insert(record.date.clone(), Arc::new(record)).await;
        if record.date != key {
            debug!(requested = %key, provider = %record.date, "provider date differs from requested key");
            self.cache.insert(key, Arc::clone(&record)).await;
        }

        info!(key = %key, title = %record.title, "cached APOD record");
        Ok(record)
    }

    async fn observe_rate_limit(&self, headers: &HashMap<String, String>) {
        let mut snapshot = self.rate_limit.write().await;
        if snapshot.observe(headers, self.clock.now()) {
            debug!(limit = ?snapshot.limit, remaining = ?snapshot.remaining, "updated rate-limit snapshot");
        }
    }
}
