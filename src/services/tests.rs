#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::ARCHIVE_START;
    use crate::errors::{
        classify, FetchError, FetchErrorKind, ValidationError, DEFAULT_FETCH_MESSAGE, RATE_LIMITED_MESSAGE,
        SERVER_ERROR_MESSAGE, TIMEOUT_MESSAGE,
    };
    use crate::services::dates::random_date_with;
    use crate::models::ApodRecord;
    use crate::services::mock::{ok_response, record_json, service_with, status_response, FakeUpstream};
    use crate::services::{validate_date, ApodCache};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_returns_same_record_without_upstream_call() {
        let upstream = Arc::new(FakeUpstream::serving("2026-10-17"));
        let service = service_with(upstream.clone());

        let first = service.fetch(Some(date(2000, 1, 1))).await.unwrap();
        let second = service.fetch(Some(date(2000, 1, 1))).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.date, "2000-01-01");
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_today_omits_date_parameter() {
        let upstream = Arc::new(FakeUpstream::serving("2026-10-17"));
        let service = service_with(upstream.clone());

        service.fetch(None).await.unwrap();
        service.fetch(Some(date(2001, 2, 3))).await.unwrap();

        assert_eq!(upstream.requested(), vec![None, Some(date(2001, 2, 3))]);
    }

    #[tokio::test]
    async fn test_provider_date_skew_caches_both_keys() {
        // Upstream is still on yesterday while our clock says 2026-10-17.
        let upstream = Arc::new(FakeUpstream::serving("2026-10-16"));
        let service = service_with(upstream.clone());

        let record = service.fetch(None).await.unwrap();
        assert_eq!(record.date, "2026-10-16");

        let again = service.fetch(None).await.unwrap();
        let by_provider_key = service.fetch(Some(date(2026, 10, 16))).await.unwrap();

        assert!(Arc::ptr_eq(&record, &again));
        assert!(Arc::ptr_eq(&record, &by_provider_key));
        assert!(service.cached("2026-10-17").await.is_some());
        assert_eq!(service.cache_len().await, 2);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_headers_update_snapshot() {
        let upstream = Arc::new(FakeUpstream::new(|_| {
            let mut response = ok_response("2026-10-17");
            response.headers = HashMap::from([
                ("x-ratelimit-limit".to_string(), "1000".to_string()),
                ("x-ratelimit-remaining".to_string(), "950".to_string()),
            ]);
            Ok(response)
        }));
        let service = service_with(upstream);

        assert_eq!(service.rate_limit().await.remaining, None);
        service.fetch(None).await.unwrap();

        let snapshot = service.rate_limit().await;
        assert_eq!(snapshot.limit, Some(1000));
        assert_eq!(snapshot.remaining, Some(950));
        assert!(snapshot.observed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_headers_keep_previous_snapshot() {
        let upstream = Arc::new(FakeUpstream::new(|date| {
            let mut response = ok_response(&date.map(|d| d.to_string()).unwrap_or_else(|| "2026-10-17".to_string()));
            if date.is_none() {
                response.headers.insert("x-ratelimit-remaining".to_string(), "42".to_string());
            }
            Ok(response)
        }));
        let service = service_with(upstream);

        service.fetch(None).await.unwrap();
        service.fetch(Some(date(2010, 5, 5))).await.unwrap();

        assert_eq!(service.rate_limit().await.remaining, Some(42));
    }

    #[tokio::test]
    async fn test_upstream_failures_are_classified() {
        let cases = [
            (status_response(429, ""), FetchErrorKind::RateLimited, RATE_LIMITED_MESSAGE),
            (status_response(500, "boom"), FetchErrorKind::ServerError, SERVER_ERROR_MESSAGE),
        ];
        for (response, kind, message) in cases {
            let upstream = Arc::new(FakeUpstream::new(move |_| Ok(response.clone())));
            let service = service_with(upstream);

            let err = service.fetch(None).await.unwrap_err();
            assert_eq!(err.kind, kind);
            assert_eq!(classify(&err, DEFAULT_FETCH_MESSAGE).0, message);
        }

        let upstream = Arc::new(FakeUpstream::new(|_| Err(FetchError::timeout("operation timed out"))));
        let err = service_with(upstream).fetch(None).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Timeout);
        assert_eq!(err.status, None);
        assert_eq!(classify(&err, DEFAULT_FETCH_MESSAGE).0, TIMEOUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_rate_limited_response_still_updates_snapshot() {
        let upstream = Arc::new(FakeUpstream::new(|_| {
            let mut response = status_response(429, "");
            response.headers.insert("x-ratelimit-remaining".to_string(), "0".to_string());
            Ok(response)
        }));
        let service = service_with(upstream);

        assert!(service.fetch(None).await.is_err());
        assert_eq!(service.rate_limit().await.remaining, Some(0));
    }

    #[tokio::test]
    async fn test_invalid_body_is_other_error() {
        let upstream = Arc::new(FakeUpstream::new(|_| Ok(status_response(200, "<html>not json</html>"))));
        let err = service_with(upstream).fetch(None).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Other);
        assert!(err.detail.starts_with("invalid APOD response"));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let upstream = Arc::new(FakeUpstream::new(|_| Ok(status_response(503, ""))));
        let service = service_with(upstream.clone());

        assert!(service.fetch(None).await.is_err());
        assert!(service.fetch(None).await.is_err());
        assert_eq!(upstream.calls(), 2);
        assert_eq!(service.cache_len().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_request() {
        let upstream = Arc::new(FakeUpstream::serving("2026-10-17").with_delay(Duration::from_millis(50)));
        let service = service_with(upstream.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.fetch(Some(date(1999, 9, 9))).await })
            })
            .collect();

        let mut records = Vec::new();
        for handle in handles {
            records.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(upstream.calls(), 1);
        assert!(records.iter().all(|r| Arc::ptr_eq(r, &records[0])));
    }

    #[tokio::test]
    async fn test_concurrent_failure_reaches_every_waiter() {
        let upstream = Arc::new(
            FakeUpstream::new(|_| Ok(status_response(429, ""))).with_delay(Duration::from_millis(50)),
        );
        let service = service_with(upstream.clone());

        let (a, b) = tokio::join!(service.fetch(None), service.fetch(None));

        assert_eq!(a.unwrap_err().kind, FetchErrorKind::RateLimited);
        assert_eq!(b.unwrap_err().kind, FetchErrorKind::RateLimited);
        assert_eq!(upstream.calls(), 1);

        // The finished flight is gone, so the next call goes upstream again.
        assert!(service.fetch(None).await.is_err());
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_still_completes() {
        let upstream = Arc::new(FakeUpstream::serving("2026-10-17").with_delay(Duration::from_millis(50)));
        let service = service_with(upstream.clone());

        let waiter = {
            let service = service.clone();
            tokio::spawn(async move { service.fetch(Some(date(1999, 9, 9))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(upstream.calls(), 1);
        assert_eq!(service.in_flight_len().await, 0);
        assert!(service.cached("1999-09-09").await.is_some());

        let record = service.fetch(Some(date(1999, 9, 9))).await.unwrap();
        assert_eq!(record.date, "1999-09-09");
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_later_caller_joins_flight_after_first_waiter_leaves() {
        let upstream = Arc::new(FakeUpstream::serving("2026-10-17").with_delay(Duration::from_millis(100)));
        let service = service_with(upstream.clone());

        let waiter = {
            let service = service.clone();
            tokio::spawn(async move { service.fetch(Some(date(2000, 1, 1))).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();

        let record = service.fetch(Some(date(2000, 1, 1))).await.unwrap();
        assert_eq!(record.date, "2000-01-01");
        assert_eq!(upstream.calls(), 1);
        assert_eq!(service.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_cache_keeps_first_entry() {
        let cache = ApodCache::new();
        assert!(cache.is_empty().await);

        let first: Arc<ApodRecord> = Arc::new(serde_json::from_str(&record_json("2000-01-01")).unwrap());
        let second = Arc::new((*first).clone());

        let stored = cache.insert("2000-01-01", first.clone()).await;
        let kept = cache.insert("2000-01-01", second).await;

        assert!(Arc::ptr_eq(&stored, &first));
        assert!(Arc::ptr_eq(&kept, &first));
        assert_eq!(cache.len().await, 1);
        assert!(!cache.is_empty().await);
        assert!(cache.get("2000-01-02").await.is_none());
    }

    #[test]
    fn test_validate_date() {
        let today = date(2026, 10, 17);

        assert_eq!(validate_date("2024-13-40", today), Err(ValidationError::Format));
        assert_eq!(validate_date("2024-1-4", today), Err(ValidationError::Format));
        assert_eq!(validate_date(" 2000-01-01", today), Err(ValidationError::Format));
        assert_eq!(validate_date("", today), Err(ValidationError::Format));
        assert_eq!(validate_date("1990-01-01", today), Err(ValidationError::Range { today }));
        assert_eq!(validate_date("2026-10-18", today), Err(ValidationError::Range { today }));
        assert_eq!(validate_date("2000-01-01", today), Ok(date(2000, 1, 1)));
    }

    #[test]
    fn test_validate_date_bounds_are_inclusive() {
        let today = date(2026, 10, 17);
        assert_eq!(validate_date("1995-06-16", today), Ok(*ARCHIVE_START));
        assert_eq!(validate_date("1995-06-15", today), Err(ValidationError::Range { today }));
        assert_eq!(validate_date("2026-10-17", today), Ok(today));
    }

    #[test]
    fn test_random_date_stays_in_range() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 23, 59, 59).unwrap();
        let today = now.date_naive();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..10_000 {
            let picked = random_date_with(&mut rng, now);
            assert!(picked >= *ARCHIVE_START && picked <= today, "out of range: {}", picked);
        }
    }

    #[test]
    fn test_random_date_with_thread_rng() {
        let now = Utc::now();
        for _ in 0..10_000 {
            let picked = crate::services::random_date(now);
            assert!(picked >= *ARCHIVE_START && picked <= now.date_naive());
        }
    }
}
