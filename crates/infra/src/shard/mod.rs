//! Connection lifecycle for the central store and the product shards.
//!
//! Pools are opened once by [`ShardSet::connect`] and closed by
//! [`ShardSet::shutdown`]. Nothing connects lazily.

pub(crate) mod schema;

use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{Any, AnyPool, Transaction};
use tracing::{info, instrument, warn};

use shardcat_catalog::ShardRouter;
use shardcat_core::ShardId;

use crate::config::{CatalogConfig, ConfigError, StoreConfig};
use crate::error::{CatalogError, map_sqlx_error};

/// Identifier of the central (non-product) store in errors and logs.
pub const CENTRAL_STORE: &str = "central";

/// SQL backend behind a store, chosen from the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else {
            let scheme = url.split(':').next().unwrap_or_default();
            Err(ConfigError::Invalid(format!(
                "unsupported store url scheme '{scheme}'"
            )))
        }
    }
}

/// One independently transactional store.
#[derive(Debug, Clone)]
pub struct Store {
    id: ShardId,
    pool: AnyPool,
    dialect: Dialect,
}

impl Store {
    async fn connect(id: ShardId, config: &StoreConfig) -> Result<Self, CatalogError> {
        let url = config.connection_url()?;
        let dialect = Dialect::from_url(&url)?;

        let mut options = AnyPoolOptions::new().max_connections(config.max_connections.max(1));
        if dialect == Dialect::Sqlite {
            // An in-memory database is dropped with its last connection.
            options = options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(&url).await.map_err(|e| {
            CatalogError::Configuration(format!(
                "store '{id}' is unreachable: {}",
                map_sqlx_error("connect", &e)
            ))
        })?;

        info!(store = %id, ?dialect, "store connected");
        Ok(Self { id, pool, dialect })
    }

    pub fn id(&self) -> &ShardId {
        &self.id
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub(crate) async fn begin(
        &self,
        operation: &'static str,
    ) -> Result<Transaction<'static, Any>, CatalogError> {
        self.pool
            .begin()
            .await
            .map_err(|e| CatalogError::write(operation, &self.id, e))
    }

    async fn execute_ddl(&self, statements: &[impl AsRef<str>]) -> Result<(), CatalogError> {
        for stmt in statements {
            sqlx::query(stmt.as_ref())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    CatalogError::Configuration(format!(
                        "schema bootstrap failed on '{}': {}",
                        self.id,
                        map_sqlx_error("ensure_schema", &e)
                    ))
                })?;
        }
        Ok(())
    }
}

/// The central store plus every product shard, in bracket order.
#[derive(Debug)]
pub struct ShardSet {
    central: Store,
    shards: Vec<Store>,
}

impl ShardSet {
    /// Open the central store, then one pool per bracket in bracket order.
    ///
    /// On any failure the pools opened so far are closed before returning.
    #[instrument(skip_all, fields(shard_count = config.shards.len()), err)]
    pub async fn connect(config: &CatalogConfig, router: &ShardRouter) -> Result<Self, CatalogError> {
        install_default_drivers();

        if router.shards().any(|s| s.as_str() == CENTRAL_STORE) {
            return Err(CatalogError::Configuration(format!(
                "'{CENTRAL_STORE}' is reserved for the central store"
            )));
        }

        let central = Store::connect(ShardId::new(CENTRAL_STORE), &config.central).await?;
        let mut set = Self {
            central,
            shards: Vec::new(),
        };

        for id in router.shards() {
            let opened = match config.shard(id) {
                Some(shard) => Store::connect(id.clone(), &shard.store).await,
                None => Err(CatalogError::Configuration(format!(
                    "no store configured for shard '{id}'"
                ))),
            };
            match opened {
                Ok(store) => set.shards.push(store),
                Err(err) => {
                    set.shutdown().await;
                    return Err(err);
                }
            }
        }

        Ok(set)
    }

    /// Create every table if it does not exist yet. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), CatalogError> {
        self.central
            .execute_ddl(&schema::central_tables(self.central.dialect)[..])
            .await?;
        for shard in &self.shards {
            shard.execute_ddl(schema::SHARD_TABLES).await?;
        }
        info!(shards = self.shards.len(), "schema ready");
        Ok(())
    }

    /// Close every pool. In-flight queries finish first.
    pub async fn shutdown(&self) {
        self.central.pool.close().await;
        for shard in &self.shards {
            shard.pool.close().await;
        }
        info!("all stores closed");
    }

    pub fn is_closed(&self) -> bool {
        self.central.pool.is_closed() && self.shards.iter().all(|s| s.pool.is_closed())
    }

    pub fn central(&self) -> &Store {
        &self.central
    }

    pub fn shard(&self, id: &ShardId) -> Result<&Store, CatalogError> {
        self.shards.iter().find(|s| &s.id == id).ok_or_else(|| {
            warn!(shard = %id, "lookup of unconfigured shard");
            CatalogError::Configuration(format!("unknown shard '{id}'"))
        })
    }

    /// Product shards in bracket order.
    pub fn shards(&self) -> &[Store] {
        &self.shards
    }

    /// Position of `id` in bracket order. Multi-shard writers open their
    /// transactions in this order.
    pub(crate) fn bracket_index(&self, id: &ShardId) -> Option<usize> {
        self.shards.iter().position(|s| &s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_follows_url_scheme() {
        assert_eq!(Dialect::from_url("postgres://u@h/db").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_url("postgresql://u@h/db").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert!(Dialect::from_url("mysql://u@h/db").is_err());
    }

    #[tokio::test]
    async fn connect_opens_shards_in_bracket_order_and_shutdown_closes_them() {
        let config = CatalogConfig::in_memory();
        let router = config.router().unwrap();
        let set = ShardSet::connect(&config, &router).await.unwrap();
        set.ensure_schema().await.unwrap();
        set.ensure_schema().await.unwrap();

        let ids: Vec<_> = set.shards().iter().map(|s| s.id().as_str()).collect();
        assert_eq!(ids, vec!["low_price", "mid_price", "high_price"]);
        assert_eq!(set.central().id().as_str(), CENTRAL_STORE);
        assert!(set.shard(&ShardId::new("nowhere")).is_err());

        set.shutdown().await;
        assert!(set.is_closed());
    }

    #[tokio::test]
    async fn unreachable_store_is_a_configuration_error() {
        let mut config = CatalogConfig::in_memory();
        config.shards[2].store.url = Some("mysql://nobody@localhost/none".to_string());
        let router = config.router().unwrap();
        let err = ShardSet::connect(&config, &router).await.unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
    }

    #[tokio::test]
    async fn central_name_is_reserved() {
        let mut config = CatalogConfig::in_memory();
        config.shards[0].id = ShardId::new(CENTRAL_STORE);
        let router = config.router().unwrap();
        let err = ShardSet::connect(&config, &router).await.unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
    }
}
