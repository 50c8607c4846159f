use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shardcat_infra::CatalogError;

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        CatalogError::OutOfRange(e) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "out_of_range", e.to_string())
        }
        CatalogError::Configuration(msg) => {
            tracing::error!("configuration error surfaced to a request: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", msg)
        }
        CatalogError::WriteFailure {
            operation,
            shards,
            message,
        } => json_error_with(
            StatusCode::SERVICE_UNAVAILABLE,
            "write_failure",
            format!("{operation} failed: {message}"),
            json!({ "shards": shards }),
        ),
        CatalogError::AggregateWriteFailure {
            operation,
            succeeded,
            failed,
        } => {
            let failed_json: Vec<_> = failed
                .iter()
                .map(|f| json!({ "shard": f.shard, "message": f.message }))
                .collect();
            json_error_with(
                StatusCode::BAD_GATEWAY,
                "partial_write",
                format!("{operation} did not reach every shard"),
                json!({ "succeeded": succeeded, "failed": failed_json }),
            )
        }
        CatalogError::ReadFailure { shard, message } => json_error_with(
            StatusCode::SERVICE_UNAVAILABLE,
            "read_failure",
            message,
            json!({ "shards": [shard] }),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}
