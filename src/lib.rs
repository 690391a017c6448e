pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod views;

pub use config::Config;
pub use errors::{classify, AppError, FetchError, FetchErrorKind, LogRecord, ValidationError};
pub use models::{ApodRecord, AppState, MediaType, RateLimitSnapshot};
pub use services::ApodService;
