use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use shardcat_infra::InventoryCatalog;

use crate::app::{dto, errors};

pub fn categories_router() -> Router {
    Router::new().route("/", get(list_categories).post(create_category))
}

pub fn suppliers_router() -> Router {
    Router::new().route("/", get(list_suppliers).post(create_supplier))
}

pub async fn create_category(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    let id = match dto::parse_category_id(body.id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.add_category(id, body.name).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_categories(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
) -> axum::response::Response {
    match catalog.list_categories().await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn create_supplier(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Json(body): Json<dto::CreateSupplierRequest>,
) -> axum::response::Response {
    let id = match dto::parse_supplier_id(body.id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match catalog.add_supplier(id, body.name, body.contact_info).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_suppliers(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
) -> axum::response::Response {
    match catalog.list_suppliers().await {
        Ok(suppliers) => Json(suppliers).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
