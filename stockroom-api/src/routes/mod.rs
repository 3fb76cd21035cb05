//! REST API Routes Module

pub mod health;
pub mod products;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router with request tracing.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/products", products::create_router())
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
