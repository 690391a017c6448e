use hyper::{HeaderMap, header::{HeaderName, HeaderValue}};
use tracing::info;
use warp::log::Info;


/// CORS headers for the read-only JSON routes.
pub fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("Content-Type"),
    );
}

pub fn request_log() -> warp::log::Log<impl Fn(Info<'_>) + Copy + Send + Sync> {
    warp::log::custom(|info: Info<'_>| {
        info!(
            method = %info.method(),
            path = info.path(),
            status = info.status().as_u16(),
            elapsed_ms = info.elapsed().as_millis() as u64,
            "request"
        );
    })
}
