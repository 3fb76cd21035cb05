//! HTTP server lifecycle.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Serve `router` on `listener` until `signal` resolves.
///
/// Once `signal` fires the listener stops accepting connections and this
/// returns after every in-flight request has been answered.
pub async fn serve_until<F>(listener: TcpListener, router: Router, signal: F) -> ApiResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Shutdown signal received, draining in-flight requests");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))
}

/// Resolve on ctrl-c. If the handler cannot be installed, never resolve.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
