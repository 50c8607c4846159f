//! Storage layer: shard connections, replicated reference data, sharded
//! products, cross-shard price migration and the central audit log.

pub mod audit_log;
pub mod catalog;
pub mod config;
pub mod error;
pub mod migration;
pub mod product_store;
pub mod reference;
pub mod shard;
mod txn;

pub use audit_log::AuditLog;
pub use catalog::InventoryCatalog;
pub use config::{CatalogConfig, ConfigError, ShardConfig, StoreConfig};
pub use error::{CatalogError, ShardFailure};
pub use migration::{MigrationCoordinator, PendingMigration, ReconcileReport};
pub use product_store::ProductStore;
pub use reference::{DriftKind, ReferenceDataService, ReferenceTable, ReplicaDrift, ReplicaReport};
pub use shard::{CENTRAL_STORE, Dialect, ShardSet, Store};
