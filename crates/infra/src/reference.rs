//! Reference Data Service: categories and suppliers, replicated to every
//! product shard.
//!
//! ## Replication
//!
//! Each shard write runs in its own transaction and every shard is attempted,
//! so a partial failure reports exactly which replicas hold the row. Writes are
//! insert-if-absent: a shard that already holds an identical row counts as
//! success, which makes retrying a partially failed call safe. A shard holding
//! a *different* row under the same id fails.
//!
//! Reads come from the first shard in bracket order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::{info, instrument, warn};

use shardcat_catalog::{Category, Supplier};
use shardcat_core::{CategoryId, Entity, ShardId, SupplierId};

use crate::error::{CatalogError, ShardFailure, map_sqlx_error};
use crate::shard::{ShardSet, Store};
use crate::txn::Tx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTable {
    Categories,
    Suppliers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// Present on the reference shard, absent here.
    Missing,
    /// Present here, absent on the reference shard.
    Unexpected,
    /// Present on both with different contents.
    Differs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaDrift {
    pub shard: ShardId,
    pub table: ReferenceTable,
    pub id: i64,
    pub kind: DriftKind,
}

/// Result of comparing every shard's reference tables with the first shard's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaReport {
    pub reference_shard: ShardId,
    pub categories: usize,
    pub suppliers: usize,
    pub drift: Vec<ReplicaDrift>,
}

impl ReplicaReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty()
    }
}

enum ReferenceRow<'a> {
    Category(&'a Category),
    Supplier(&'a Supplier),
}

#[derive(Debug, Clone)]
pub struct ReferenceDataService {
    shards: Arc<ShardSet>,
}

impl ReferenceDataService {
    pub fn new(shards: Arc<ShardSet>) -> Self {
        Self { shards }
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    pub async fn add_category(&self, category: &Category) -> Result<(), CatalogError> {
        self.replicate("add_category", ReferenceRow::Category(category))
            .await
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    pub async fn add_supplier(&self, supplier: &Supplier) -> Result<(), CatalogError> {
        self.replicate("add_supplier", ReferenceRow::Supplier(supplier))
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        categories_on(self.reference_shard()?).await
    }

    #[instrument(skip(self), err)]
    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>, CatalogError> {
        suppliers_on(self.reference_shard()?).await
    }

    /// Compare every replica against the first shard.
    #[instrument(skip(self), err)]
    pub async fn verify_replicas(&self) -> Result<ReplicaReport, CatalogError> {
        let reference = self.reference_shard()?;
        let ref_categories = by_id(categories_on(reference).await?, CategoryId::get);
        let ref_suppliers = by_id(suppliers_on(reference).await?, SupplierId::get);

        let mut drift = Vec::new();
        for store in self.shards.shards().iter().skip(1) {
            let categories = by_id(categories_on(store).await?, CategoryId::get);
            let suppliers = by_id(suppliers_on(store).await?, SupplierId::get);
            drift.extend(diff(store.id(), ReferenceTable::Categories, &ref_categories, &categories));
            drift.extend(diff(store.id(), ReferenceTable::Suppliers, &ref_suppliers, &suppliers));
        }

        if !drift.is_empty() {
            warn!(drift_count = drift.len(), "reference replicas have drifted");
        }

        Ok(ReplicaReport {
            reference_shard: reference.id().clone(),
            categories: ref_categories.len(),
            suppliers: ref_suppliers.len(),
            drift,
        })
    }

    fn reference_shard(&self) -> Result<&Store, CatalogError> {
        self.shards
            .shards()
            .first()
            .ok_or_else(|| CatalogError::Configuration("no product shards configured".to_string()))
    }

    async fn replicate(
        &self,
        operation: &'static str,
        row: ReferenceRow<'_>,
    ) -> Result<(), CatalogError> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for store in self.shards.shards() {
            match write_to(store, operation, &row).await {
                Ok(()) => succeeded.push(store.id().clone()),
                Err(message) => {
                    warn!(operation, shard = %store.id(), %message, "replica write failed");
                    failed.push(ShardFailure {
                        shard: store.id().clone(),
                        message,
                    });
                }
            }
        }

        if failed.is_empty() {
            info!(operation, shards = succeeded.len(), "replicated to every shard");
            Ok(())
        } else {
            Err(CatalogError::AggregateWriteFailure {
                operation,
                succeeded,
                failed,
            })
        }
    }
}

async fn write_to(store: &Store, operation: &str, row: &ReferenceRow<'_>) -> Result<(), String> {
    let mut tx = store
        .pool()
        .begin()
        .await
        .map_err(|e| map_sqlx_error(operation, &e))?;
    write_row(&mut tx, row).await.map_err(|e| match e {
        RowError::Conflict(message) => message,
        RowError::Sql(e) => map_sqlx_error(operation, &e),
    })?;
    tx.commit().await.map_err(|e| map_sqlx_error(operation, &e))
}

enum RowError {
    /// The shard holds a different row under the same id.
    Conflict(String),
    Sql(sqlx::Error),
}

impl From<sqlx::Error> for RowError {
    fn from(err: sqlx::Error) -> Self {
        RowError::Sql(err)
    }
}

/// Insert if absent, then read back and compare.
async fn write_row(tx: &mut Tx, row: &ReferenceRow<'_>) -> Result<(), RowError> {
    match row {
        ReferenceRow::Category(category) => {
            sqlx::query(
                r#"
                INSERT INTO categories (category_id, category_name)
                VALUES ($1, $2)
                ON CONFLICT (category_id) DO NOTHING
                "#,
            )
            .bind(category.id.get())
            .bind(category.name.as_str())
            .execute(&mut **tx)
            .await?;

            let stored: String =
                sqlx::query("SELECT category_name FROM categories WHERE category_id = $1")
                    .bind(category.id.get())
                    .fetch_one(&mut **tx)
                    .await
                    .and_then(|r| r.try_get("category_name"))?;

            if stored != category.name {
                return Err(RowError::Conflict(format!(
                    "category {} already exists as '{stored}'",
                    category.id
                )));
            }
        }
        ReferenceRow::Supplier(supplier) => {
            sqlx::query(
                r#"
                INSERT INTO suppliers (supplier_id, supplier_name, contact_info)
                VALUES ($1, $2, $3)
                ON CONFLICT (supplier_id) DO NOTHING
                "#,
            )
            .bind(supplier.id.get())
            .bind(supplier.name.as_str())
            .bind(supplier.contact_info.as_str())
            .execute(&mut **tx)
            .await?;

            let stored = sqlx::query(
                "SELECT supplier_name, contact_info FROM suppliers WHERE supplier_id = $1",
            )
            .bind(supplier.id.get())
            .fetch_one(&mut **tx)
            .await
            .and_then(|r| {
                Ok((
                    r.try_get::<String, _>("supplier_name")?,
                    r.try_get::<String, _>("contact_info")?,
                ))
            })?;

            if stored.0 != supplier.name || stored.1 != supplier.contact_info {
                return Err(RowError::Conflict(format!(
                    "supplier {} already exists as '{}' <{}>",
                    supplier.id, stored.0, stored.1
                )));
            }
        }
    }
    Ok(())
}

async fn categories_on(store: &Store) -> Result<Vec<Category>, CatalogError> {
    let rows = sqlx::query("SELECT category_id, category_name FROM categories ORDER BY category_id")
        .fetch_all(store.pool())
        .await
        .map_err(|e| CatalogError::read("list_categories", store.id(), e))?;
    rows.iter()
        .map(|row| category_from_row(row).map_err(|e| CatalogError::corrupt_row(store.id(), e)))
        .collect()
}

async fn suppliers_on(store: &Store) -> Result<Vec<Supplier>, CatalogError> {
    let rows = sqlx::query(
        "SELECT supplier_id, supplier_name, contact_info FROM suppliers ORDER BY supplier_id",
    )
    .fetch_all(store.pool())
    .await
    .map_err(|e| CatalogError::read("list_suppliers", store.id(), e))?;
    rows.iter()
        .map(|row| supplier_from_row(row).map_err(|e| CatalogError::corrupt_row(store.id(), e)))
        .collect()
}

fn category_from_row(row: &AnyRow) -> Result<Category, String> {
    let id: i64 = row.try_get("category_id").map_err(|e| e.to_string())?;
    Ok(Category {
        id: CategoryId::new(id).map_err(|e| e.to_string())?,
        name: row.try_get("category_name").map_err(|e| e.to_string())?,
    })
}

fn supplier_from_row(row: &AnyRow) -> Result<Supplier, String> {
    let id: i64 = row.try_get("supplier_id").map_err(|e| e.to_string())?;
    Ok(Supplier {
        id: SupplierId::new(id).map_err(|e| e.to_string())?,
        name: row.try_get("supplier_name").map_err(|e| e.to_string())?,
        contact_info: row.try_get("contact_info").map_err(|e| e.to_string())?,
    })
}

fn by_id<T: Entity>(rows: Vec<T>, key: fn(&T::Id) -> i64) -> BTreeMap<i64, T> {
    rows.into_iter().map(|row| (key(row.id()), row)).collect()
}

fn diff<T: PartialEq>(
    shard: &ShardId,
    table: ReferenceTable,
    reference: &BTreeMap<i64, T>,
    replica: &BTreeMap<i64, T>,
) -> Vec<ReplicaDrift> {
    let drift = |id: i64, kind| ReplicaDrift {
        shard: shard.clone(),
        table,
        id,
        kind,
    };

    let mut out = Vec::new();
    for (id, expected) in reference {
        match replica.get(id) {
            None => out.push(drift(*id, DriftKind::Missing)),
            Some(actual) if actual != expected => out.push(drift(*id, DriftKind::Differs)),
            Some(_) => {}
        }
    }
    for id in replica.keys().filter(|id| !reference.contains_key(id)) {
        out.push(drift(*id, DriftKind::Unexpected));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(i64, &str)]) -> BTreeMap<i64, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn diff_reports_missing_unexpected_and_divergent_rows() {
        let shard = ShardId::new("mid_price");
        let reference = map(&[(1, "Electronics"), (2, "Furniture"), (3, "Clothing")]);
        let replica = map(&[(1, "Electronics"), (3, "Apparel"), (4, "Toys")]);

        let drift = diff(&shard, ReferenceTable::Categories, &reference, &replica);
        let kinds: Vec<_> = drift.iter().map(|d| (d.id, d.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, DriftKind::Missing),
                (3, DriftKind::Differs),
                (4, DriftKind::Unexpected)
            ]
        );
        assert!(drift.iter().all(|d| d.shard == shard));
    }

    #[test]
    fn identical_replicas_have_no_drift() {
        let shard = ShardId::new("high_price");
        let reference = map(&[(1, "Electronics")]);
        assert!(diff(&shard, ReferenceTable::Suppliers, &reference, &reference.clone()).is_empty());
    }
}
