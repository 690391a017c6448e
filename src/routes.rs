use std::convert::Infallible;
use warp::{Filter, Reply};

use crate::handlers;
use crate::middleware::request_log;
use crate::models::AppState;

const FORM_BODY_LIMIT: u64 = 4 * 1024;

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// The full route tree, with rejection recovery and request logging applied.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health_check = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    let index = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::index);

    let date_picture = warp::path("get-date-picture")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(FORM_BODY_LIMIT))
        .and(warp::body::form())
        .and(with_state(state.clone()))
        .and_then(handlers::date_picture);

    let random = warp::path("random")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::random);

    let api_today = warp::path!("api" / "today")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::api_today);

    let api_date = warp::path!("api" / "date" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::api_date);

    let api_rate_limit = warp::path!("api" / "rate-limit")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::api_rate_limit);

    health_check
        .or(index)
        .or(date_picture)
        .or(random)
        .or(api_today)
        .or(api_date)
        .or(api_rate_limit)
        .recover(handlers::handle_rejection)
        .with(request_log())
}
