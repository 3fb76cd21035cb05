//! Stockroom API - Cache Coordinator and REST Layer
//!
//! Wires the record store, both cache strategies and the change event
//! channels into one application state, and exposes them over an Axum
//! REST API under `/api/products`.

pub mod macros;

pub mod cached_catalog;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use cached_catalog::DeclarativeCacheCoordinator;
pub use config::{ApiConfig, AppConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use server::serve_until;
pub use state::{AppState, Bootstrapped, Catalog, CatalogStore, ManualCatalog};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
