//! Operational endpoints: shard counts, replica checks, migration recovery.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    response::IntoResponse,
    routing::{get, post},
};

use shardcat_infra::InventoryCatalog;

use crate::app::{dto, errors};

const DEFAULT_LOG_LIMIT: u32 = 50;

pub fn router() -> Router {
    Router::new()
        .route("/replicas", get(verify_replicas))
        .route("/migrations", get(pending_migrations))
        .route("/reconcile", post(reconcile))
        .route("/log", get(recent_log))
}

pub async fn shard_counts(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
) -> axum::response::Response {
    match catalog.shard_counts().await {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn verify_replicas(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
) -> axum::response::Response {
    match catalog.verify_reference_replicas().await {
        Ok(report) => Json(serde_json::json!({
            "consistent": report.is_consistent(),
            "report": report,
        }))
        .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn pending_migrations(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
) -> axum::response::Response {
    match catalog.pending_migrations().await {
        Ok(pending) => Json(pending).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn reconcile(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
) -> axum::response::Response {
    match catalog.reconcile_migrations().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn recent_log(
    Extension(catalog): Extension<Arc<InventoryCatalog>>,
    Query(query): Query<dto::LogQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    match catalog.recent_log_entries(limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
