//! Health and Statistics Endpoints
//!
//! - /health/ping - Liveness check
//! - /health/stats - Cache and consumer counters

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use stockroom_events::ChangeEventConsumer;
use stockroom_storage::{CacheTransport, InMemoryCacheTransport};

use crate::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerStatsResponse {
    pub received: u64,
    pub acknowledged: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub lost: u64,
    pub replayed: u64,
    pub expired: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub cache: CacheStatsResponse,
    pub consumer: ConsumerStatsResponse,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
pub async fn ping(State(start_time): State<std::time::Instant>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
    })
}

/// GET /health/stats
pub async fn stats(
    State(cache): State<Arc<InMemoryCacheTransport>>,
    State(consumer): State<ChangeEventConsumer>,
) -> ApiResult<Json<StatsResponse>> {
    let cache = cache.stats().await?;
    let consumer = consumer.metrics().snapshot();

    Ok(Json(StatsResponse {
        cache: CacheStatsResponse {
            hits: cache.hits,
            misses: cache.misses,
            entry_count: cache.entry_count,
            evictions: cache.evictions,
            hit_rate: cache.hit_rate(),
        },
        consumer: ConsumerStatsResponse {
            received: consumer.received,
            acknowledged: consumer.acknowledged,
            retried: consumer.retried,
            dead_lettered: consumer.dead_lettered,
            lost: consumer.lost,
            replayed: consumer.replayed,
            expired: consumer.expired,
        },
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/stats", get(stats))
}
