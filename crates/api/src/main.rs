use std::sync::Arc;

use anyhow::Context;

use shardcat_api::{BIND_ENV, DEFAULT_BIND};
use shardcat_infra::{CatalogConfig, InventoryCatalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shardcat_observability::init();

    let config = CatalogConfig::from_env().context("failed to load catalog config")?;
    let catalog = Arc::new(
        InventoryCatalog::open(&config)
            .await
            .context("failed to open catalog")?,
    );

    let bind = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let app = shardcat_api::app::build_app(catalog.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    catalog.close().await;
    served.context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
