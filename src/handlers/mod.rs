use std::convert::Infallible;
use chrono::NaiveDate;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use warp::{Rejection, Reply};

use crate::errors::{classify, AppError, DEFAULT_FETCH_MESSAGE};
use crate::middleware::add_cors_headers;
use crate::models::{ApodRecord, AppState};
use crate::services::{cache_key, validate_date};
use crate::views::{render_page, PageView};


#[derive(Debug, Deserialize)]
pub struct DateForm {
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

type HtmlReply = warp::reply::WithStatus<warp::reply::Html<String>>;

const RENDER_FAILED_PAGE: &str = "<!DOCTYPE html><html><body><p>Something went wrong. Please try again later.</p></body></html>";

async fn render(
    state: &AppState,
    record: Option<&ApodRecord>,
    error: Option<&str>,
    selected_date: Option<&str>,
    status: StatusCode,
) -> HtmlReply {
    let page = render_page(&PageView {
        record,
        error,
        selected_date,
        today: state.service.today(),
        rate_limit: state.service.rate_limit().await,
    });
    match page {
        Ok(page) => warp::reply::with_status(warp::reply::html(page), status),
        Err(e) => {
            error!(error = %e, "failed to render page");
            warp::reply::with_status(
                warp::reply::html(RENDER_FAILED_PAGE.to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

async fn render_fetch(state: &AppState, date: Option<NaiveDate>, selected_date: Option<&str>) -> HtmlReply {
    match state.service.fetch(date).await {
        Ok(record) => render(state, Some(record.as_ref()), None, selected_date, StatusCode::OK).await,
        Err(e) => {
            let (message, log) = classify(&e, DEFAULT_FETCH_MESSAGE);
            log.emit();
            render(state, None, Some(message.as_str()), selected_date, e.kind.http_status()).await
        }
    }
}

fn json_reply<T: Serialize>(value: &T) -> warp::reply::Response {
    let mut response = warp::reply::json(value).into_response();
    add_cors_headers(response.headers_mut());
    response
}

/// `GET /`
pub async fn index(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(render_fetch(&state, None, None).await)
}

/// `POST /get-date-picture`
pub async fn date_picture(form: DateForm, state: AppState) -> Result<impl Reply, Rejection> {
    match validate_date(&form.date, state.service.today()) {
        Ok(date) => Ok(render_fetch(&state, Some(date), Some(form.date.as_str())).await),
        Err(e) => {
            debug!(input = %form.date, code = e.code(), "rejected date input");
            let message = e.to_string();
            let selected = Some(form.date.as_str());
            Ok(render(&state, None, Some(message.as_str()), selected, StatusCode::BAD_REQUEST).await)
        }
    }
}

/// `GET /random`
pub async fn random(state: AppState) -> Result<impl Reply, Rejection> {
    let date = state.service.random_date();
    let key = cache_key(date);
    Ok(render_fetch(&state, Some(date), Some(key.as_str())).await)
}

/// `GET /api/today`
pub async fn api_today(state: AppState) -> Result<impl Reply, Rejection> {
    let record = state
        .service
        .fetch(None)
        .await
        .map_err(|e| warp::reject::custom(AppError::from(e)))?;
    Ok(json_reply(&*record))
}

/// `GET /api/date/:date`
pub async fn api_date(date: String, state: AppState) -> Result<impl Reply, Rejection> {
    let date = validate_date(&date, state.service.today())
        .map_err(|e| warp::reject::custom(AppError::from(e)))?;
    let record = state
        .service
        .fetch(Some(date))
        .await
        .map_err(|e| warp::reject::custom(AppError::from(e)))?;
    Ok(json_reply(&*record))
}

/// `GET /api/rate-limit`
pub async fn api_rate_limit(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(json_reply(&state.service.rate_limit().await))
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, label, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "NOT_FOUND", "Not Found".to_string())
    } else if let Some(e) = err.find::<AppError>() {
        match e {
            AppError::Validation(v) => (StatusCode::BAD_REQUEST, v.code(), v.to_string()),
            AppError::Upstream(f) => {
                let (message, log) = classify(f, DEFAULT_FETCH_MESSAGE);
                log.emit();
                (f.kind.http_status(), f.kind.code(), message)
            }
        }
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method Not Allowed".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "LENGTH_REQUIRED", "Content-Length header required".to_string())
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::PayloadTooLarge>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        (StatusCode::BAD_REQUEST, "BAD_REQUEST", "Malformed request body".to_string())
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error".to_string())
    };

    let body = ErrorBody { error: message, code: label };
    Ok(warp::reply::with_status(warp::reply::json(&body), code))
}
