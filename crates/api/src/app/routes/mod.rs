use axum::{Router, routing::get};

pub mod admin;
pub mod products;
pub mod reference;
pub mod system;

/// Router for every catalog endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/categories", reference::categories_router())
        .nest("/suppliers", reference::suppliers_router())
        .nest("/products", products::router())
        .route("/shards/counts", get(admin::shard_counts))
        .nest("/admin", admin::router())
}
