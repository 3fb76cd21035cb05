//! Product REST API Routes
//!
//! The plain routes go through the declarative cache coordinator; the
//! `/manual` routes go through the manual cache-aside store. Both share one
//! cache, so either path can observe entries written by the other.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use stockroom_core::{ProductDto, ProductId};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, Catalog, ManualCatalog};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/products - List every product
pub async fn list_products(State(catalog): State<Arc<Catalog>>) -> ApiResult<Json<Vec<ProductDto>>> {
    Ok(Json(catalog.get_all().await?))
}

/// POST /api/products - Create a product
pub async fn create_product(
    State(catalog): State<Arc<Catalog>>,
    Json(req): Json<ProductDto>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }

    let created = catalog.create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/products/:id - Get a product
pub async fn get_product(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductDto>> {
    let id = ProductId::new(id);
    catalog
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::product_not_found(id))
}

/// PUT /api/products/:id - Update a product's name and price
///
/// The path id wins over any id in the body.
pub async fn update_product(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<i64>,
    Json(mut req): Json<ProductDto>,
) -> ApiResult<Json<ProductDto>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }

    let id = ProductId::new(id);
    req.id = Some(id);
    catalog
        .update(id, req)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::product_not_found(id))
}

/// DELETE /api/products/:id - Delete a product
pub async fn delete_product(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    catalog.delete(ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/products/cache - Clear the product cache namespace
pub async fn clear_cache(State(catalog): State<Arc<Catalog>>) -> &'static str {
    catalog.clear_all().await;
    "All caches cleared successfully."
}

/// GET /api/products/manual/:id - Get a product via the manual cache
pub async fn get_product_manual(
    State(manual): State<Arc<ManualCatalog>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProductDto>> {
    let id = ProductId::new(id);
    manual
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::product_not_found(id))
}

/// GET /api/products/manual - List every product via the manual cache
pub async fn list_products_manual(
    State(manual): State<Arc<ManualCatalog>>,
) -> ApiResult<Json<Vec<ProductDto>>> {
    Ok(Json(manual.get_all().await?))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Product routes, to be nested under `/api/products`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/cache", delete(clear_cache))
        .route("/manual", get(list_products_manual))
        .route("/manual/:id", get(get_product_manual))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}
