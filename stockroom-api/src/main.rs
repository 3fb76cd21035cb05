//! Stockroom API Server Entry Point
//!
//! Bootstraps configuration and application state, then serves the Axum
//! router until ctrl-c. In-flight requests are answered before the event
//! listeners are told to stop.

use stockroom_api::{
    create_api_router, init_tracing, serve_until, server, ApiConfig, ApiError, ApiResult,
    AppConfig, AppState, TelemetryConfig,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let app_config = AppConfig::from_env();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bootstrapped = AppState::bootstrap(&app_config, shutdown_rx)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bootstrap: {}", e)))?;

    let app = create_api_router(bootstrapped.state);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting Stockroom API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let served = serve_until(listener, app, server::ctrl_c()).await;

    let _ = shutdown_tx.send(true);
    for consumer in bootstrapped.consumers {
        if let Err(e) = consumer.await {
            tracing::warn!(error = %e, "Consumer task ended abnormally");
        }
    }

    tracing::info!("Stockroom API server stopped");
    served
}
