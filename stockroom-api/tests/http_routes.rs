//! HTTP Route Tests
//!
//! Drives the full router with `tower::ServiceExt::oneshot` against a
//! bootstrapped in-memory application holding product `{1, "A", 10, "x"}`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use stockroom_api::{create_api_router, AppConfig, AppState, Bootstrapped};
use stockroom_storage::CacheTransport;
use stockroom_test_utils::fixtures::sample_product;
use tokio::sync::watch;
use tower::ServiceExt;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

struct TestApp {
    router: Router,
    state: AppState,
    _shutdown: watch::Sender<bool>,
}

async fn test_app() -> TestApp {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let Bootstrapped { state, .. } = AppState::bootstrap(&AppConfig::development(), shutdown_rx)
        .await
        .expect("bootstrap should succeed");
    state
        .records
        .seed([sample_product()])
        .expect("seed should succeed");

    TestApp {
        router: create_api_router(state.clone()),
        state,
        _shutdown: shutdown_tx,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("body should be JSON")
}

// ============================================================================
// PRODUCT ROUTES
// ============================================================================

#[tokio::test]
async fn test_get_product_returns_record() {
    let app = test_app().await;

    let (status, body) = send(&app.router, "GET", "/api/products/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({"id": 1, "name": "A", "price": 10, "category": "x"})
    );
}

#[tokio::test]
async fn test_get_missing_product_is_not_found() {
    let app = test_app().await;

    let (status, body) = send(&app.router, "GET", "/api/products/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "PRODUCT_NOT_FOUND");
    assert!(!app.state.cache.contains("product::999"));
}

#[tokio::test]
async fn test_list_products() {
    let app = test_app().await;

    let (status, body) = send(&app.router, "GET", "/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = json_body(&body);
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert!(app.state.cache.contains("product::all"));
}

#[tokio::test]
async fn test_create_product_returns_created() {
    let app = test_app().await;
    send(&app.router, "GET", "/api/products", None).await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/products",
        Some(json!({"name": "Lamp", "price": 2500, "category": "home"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let created = json_body(&body);
    assert_eq!(created["id"], 2);
    assert_eq!(created["name"], "Lamp");
    assert!(!app.state.cache.contains("product::all"));
}

#[tokio::test]
async fn test_create_product_requires_name() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/products",
        Some(json!({"name": "  ", "price": 1, "category": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "MISSING_FIELD");
    assert_eq!(app.state.records.len(), 1);
}

#[tokio::test]
async fn test_update_product_refreshes_cache() {
    let app = test_app().await;
    send(&app.router, "GET", "/api/products/1", None).await;

    let (status, body) = send(
        &app.router,
        "PUT",
        "/api/products/1",
        Some(json!({"name": "B", "price": 20})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({"id": 1, "name": "B", "price": 20, "category": "x"})
    );

    app.state.records.reset_calls();
    let (_, body) = send(&app.router, "GET", "/api/products/1", None).await;
    assert_eq!(json_body(&body)["name"], "B");
    assert_eq!(app.state.records.calls().reads(), 0);
}

#[tokio::test]
async fn test_update_missing_product_is_not_found() {
    let app = test_app().await;

    let (status, _) = send(
        &app.router,
        "PUT",
        "/api/products/42",
        Some(json!({"name": "B", "price": 20})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.state.records.len(), 1);
}

#[tokio::test]
async fn test_delete_product_returns_no_content() {
    let app = test_app().await;
    send(&app.router, "GET", "/api/products/1", None).await;

    let (status, _) = send(&app.router, "DELETE", "/api/products/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!app.state.cache.contains("product::1"));

    let (status, _) = send(&app.router, "GET", "/api/products/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_cache_route() {
    let app = test_app().await;
    send(&app.router, "GET", "/api/products/1", None).await;
    send(&app.router, "GET", "/api/products", None).await;
    assert_eq!(app.state.cache.len(), 2);

    let (status, body) = send(&app.router, "DELETE", "/api/products/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"All caches cleared successfully.");
    assert!(app.state.cache.is_empty());
}

#[tokio::test]
async fn test_manual_routes_share_cache() {
    let app = test_app().await;

    let (status, body) = send(&app.router, "GET", "/api/products/manual/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["name"], "A");

    // Entry written by the manual path serves the declarative path.
    app.state.records.reset_calls();
    let (status, _) = send(&app.router, "GET", "/api/products/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.records.calls().reads(), 0);

    let (status, _) = send(&app.router, "GET", "/api/products/manual/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app.router, "GET", "/api/products/manual", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_unavailable_store_maps_to_503() {
    let app = test_app().await;
    app.state.records.set_unavailable(true);

    let (status, body) = send(&app.router, "GET", "/api/products/1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&body)["code"], "SERVICE_UNAVAILABLE");
}

// ============================================================================
// HEALTH ROUTES
// ============================================================================

#[tokio::test]
async fn test_health_ping_and_stats() {
    let app = test_app().await;

    let (status, body) = send(&app.router, "GET", "/health/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "ok");

    send(&app.router, "GET", "/api/products/1", None).await;
    send(&app.router, "GET", "/api/products/1", None).await;

    let (status, body) = send(&app.router, "GET", "/health/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = json_body(&body);
    let expected = app.state.cache.stats().await.expect("stats");
    assert_eq!(stats["cache"]["hits"], expected.hits);
    assert_eq!(stats["cache"]["entry_count"], 1);
    assert!(stats["consumer"]["received"].is_u64());
}
