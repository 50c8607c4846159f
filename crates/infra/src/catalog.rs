//! `InventoryCatalog`: the public surface over every store.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use shardcat_catalog::{Category, InventoryLogEntry, NewProduct, Product, ShardRouter, Supplier};
use shardcat_core::{CategoryId, Price, ProductId, ShardId, SupplierId};

use crate::audit_log::AuditLog;
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::migration::{MigrationCoordinator, PendingMigration, ReconcileReport};
use crate::product_store::ProductStore;
use crate::reference::{ReferenceDataService, ReplicaReport};
use crate::shard::ShardSet;

/// Sharded inventory catalog.
///
/// Open with [`InventoryCatalog::open`], release with
/// [`InventoryCatalog::close`]. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct InventoryCatalog {
    shards: Arc<ShardSet>,
    router: Arc<ShardRouter>,
    reference: ReferenceDataService,
    products: ProductStore,
    migrations: MigrationCoordinator,
    audit: AuditLog,
}

impl InventoryCatalog {
    /// Validate the bracket table, connect every store and create the schema.
    pub async fn open(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let router = Arc::new(config.router()?);
        let shards = Arc::new(ShardSet::connect(config, &router).await?);
        if let Err(err) = shards.ensure_schema().await {
            shards.shutdown().await;
            return Err(err);
        }

        let products = ProductStore::new(shards.clone(), router.clone());
        let catalog = Self {
            reference: ReferenceDataService::new(shards.clone()),
            migrations: MigrationCoordinator::new(shards.clone(), router.clone(), products.clone()),
            audit: AuditLog::new(shards.central().clone()),
            products,
            shards,
            router,
        };
        info!(shards = catalog.shards.shards().len(), "catalog open");
        Ok(catalog)
    }

    /// Close every pool. Calls after this fail with a write or read error.
    pub async fn close(&self) {
        self.shards.shutdown().await;
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn shards(&self) -> &ShardSet {
        &self.shards
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // Reference data

    pub async fn add_category(
        &self,
        id: CategoryId,
        name: impl Into<String>,
    ) -> Result<(), CatalogError> {
        let category = Category::new(id, name)?;
        self.reference.add_category(&category).await
    }

    pub async fn add_supplier(
        &self,
        id: SupplierId,
        name: impl Into<String>,
        contact_info: impl Into<String>,
    ) -> Result<(), CatalogError> {
        let supplier = Supplier::new(id, name, contact_info)?;
        self.reference.add_supplier(&supplier).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        self.reference.list_categories().await
    }

    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>, CatalogError> {
        self.reference.list_suppliers().await
    }

    pub async fn verify_reference_replicas(&self) -> Result<ReplicaReport, CatalogError> {
        self.reference.verify_replicas().await
    }

    // Products

    pub async fn add_product(&self, input: NewProduct) -> Result<ProductId, CatalogError> {
        self.products.add_product(input).await
    }

    pub async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        self.products.get_by_id(id).await
    }

    pub async fn get_products_by_price_range(
        &self,
        min: Price,
        max: Price,
    ) -> Result<Vec<Product>, CatalogError> {
        self.products.get_by_price_range(min, max).await
    }

    pub async fn list_all_products(&self) -> Result<Vec<Product>, CatalogError> {
        self.products.list_all().await
    }

    pub async fn update_product_price(
        &self,
        id: ProductId,
        new_price: Price,
    ) -> Result<bool, CatalogError> {
        self.migrations.update_price(id, new_price).await
    }

    pub async fn update_stock(&self, id: ProductId, delta: i64) -> Result<bool, CatalogError> {
        self.products.update_stock(id, delta).await
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<bool, CatalogError> {
        self.products.delete_product(id).await
    }

    pub async fn shard_counts(&self) -> Result<BTreeMap<ShardId, u64>, CatalogError> {
        self.products.shard_counts().await
    }

    // Recovery and reporting

    pub async fn pending_migrations(&self) -> Result<Vec<PendingMigration>, CatalogError> {
        self.migrations.pending().await
    }

    pub async fn reconcile_migrations(&self) -> Result<ReconcileReport, CatalogError> {
        self.migrations.reconcile().await
    }

    pub async fn log_entries_for(
        &self,
        id: ProductId,
    ) -> Result<Vec<InventoryLogEntry>, CatalogError> {
        self.audit.entries_for(id).await
    }

    pub async fn recent_log_entries(&self, limit: u32) -> Result<Vec<InventoryLogEntry>, CatalogError> {
        self.audit.recent(limit).await
    }
}
