use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

use crate::config::ARCHIVE_START;
use crate::errors::ValidationError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid");
}

pub fn cache_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Checks user input against `YYYY-MM-DD` and the archive range
/// `[1995-06-16, today]`, both ends inclusive.
pub fn validate_date(input: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    if !DATE_PATTERN.is_match(input) {
        return Err(ValidationError::Format);
    }
    // The pattern accepts impossible dates such as 2024-13-40.
    let date = NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| ValidationError::Format)?;

    if date < *ARCHIVE_START || date > today {
        return Err(ValidationError::Range { today });
    }
    Ok(date)
}

pub fn random_date(now: DateTime<Utc>) -> NaiveDate {
    random_date_with(&mut rand::thread_rng(), now)
}

/// Picks an instant uniformly between the archive start and `now` by elapsed
/// milliseconds and returns its UTC date.
pub fn random_date_with<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> NaiveDate {
    let start = Utc.from_utc_datetime(&ARCHIVE_START.and_time(NaiveTime::default()));
    let span_ms = (now - start).num_milliseconds().max(0);
    let fraction: f64 = rng.gen();
    let offset_ms = (fraction * span_ms as f64) as i64;

    (start + Duration::milliseconds(offset_ms.min(span_ms))).date_naive()
}
