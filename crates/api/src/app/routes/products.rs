use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use shardcat_infra::InventoryCatalog;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).delete(delete_product))
        .route("/:id/price", put(update_price))
        .route("/:id/stock", post(adjust_stock))
        .route("/:id/log", get(product_log))
}

pub async fn create_product(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let input = match body.into_new_product() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.add_product(input).await {
        Ok(id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id.to_string() }))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

/// All products, or those in `[min, max)` when both bounds are given.
pub async fn list_products(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Query(query): Query<dto::PriceRangeQuery>,
) -> axum::response::Response {
    let bounds = match query.bounds() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = match bounds {
        Some((min, max)) => catalog.get_products_by_price_range(min, max).await,
        None => catalog.list_all_products().await,
    };
    match result {
        Ok(products) => Json(products).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.get_product_by_id(id).await {
        Ok(Some(product)) => Json(product).into_response(),
        Ok(None) => errors::not_found("product"),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update_price(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePriceRequest>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let price = match dto::parse_price(&body.price) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.update_product_price(id, price).await {
        Ok(true) => Json(serde_json::json!({ "id": id.to_string(), "price": price })).into_response(),
        Ok(false) => errors::not_found("product"),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.update_stock(id, body.delta).await {
        Ok(true) => Json(serde_json::json!({ "id": id.to_string(), "delta": body.delta })).into_response(),
        Ok(false) => errors::not_found("product"),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.delete_product(id).await {
        Ok(true) => Json(serde_json::json!({ "id": id.to_string(), "deleted": true })).into_response(),
        Ok(false) => errors::not_found("product"),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn product_log(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.log_entries_for(id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
