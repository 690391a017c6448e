use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use apod_viewer::{routes::routes, ApodService, AppState, Config};

const DEFAULT_LOG_FILTER: &str = "apod_viewer=info,warp=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        e
    })?;

    let service = ApodService::from_config(&config)?;
    let state = AppState::new(service);

    let addr = SocketAddr::new(config.host, config.port);
    let (bound, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(addr, async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    })?;

    tracing::info!("APOD viewer running on http://{}", bound);
    server.await;

    Ok(())
}
