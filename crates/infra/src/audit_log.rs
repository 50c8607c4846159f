//! Append-only inventory change log in the central store.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::{Span, instrument};

use shardcat_catalog::{ChangeType, InventoryLogEntry};
use shardcat_core::ProductId;

use crate::error::CatalogError;
use crate::shard::Store;
use crate::txn::Tx;

const SELECT_ENTRIES: &str = r#"
    SELECT log_id, product_id, change_type, quantity_changed, created_at
    FROM inventory_logs
"#;

/// Central audit log. Entries are never updated or deleted.
#[derive(Debug, Clone)]
pub struct AuditLog {
    central: Store,
}

impl AuditLog {
    pub fn new(central: Store) -> Self {
        Self { central }
    }

    pub fn store(&self) -> &Store {
        &self.central
    }

    /// Append one entry in its own central transaction.
    #[instrument(
        skip(self),
        fields(product_id = %product_id, change_type = %change_type),
        err
    )]
    pub async fn append(
        &self,
        product_id: ProductId,
        change_type: ChangeType,
        quantity_changed: i64,
    ) -> Result<(), CatalogError> {
        let mut tx = self.central.begin("append_log").await?;
        append_in(&mut tx, product_id, change_type, quantity_changed)
            .await
            .map_err(|e| CatalogError::write("append_log", self.central.id(), e))?;
        tx.commit()
            .await
            .map_err(|e| CatalogError::write("append_log", self.central.id(), e))
    }

    /// Every entry for one product, oldest first.
    #[instrument(
        skip(self),
        fields(product_id = %product_id, entry_count = tracing::field::Empty),
        err
    )]
    pub async fn entries_for(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryLogEntry>, CatalogError> {
        let sql = format!("{SELECT_ENTRIES} WHERE product_id = $1 ORDER BY log_id ASC");
        let rows = sqlx::query(&sql)
            .bind(product_id.to_string())
            .fetch_all(self.central.pool())
            .await
            .map_err(|e| CatalogError::read("entries_for", self.central.id(), e))?;

        let entries = self.decode_all(&rows)?;
        Span::current().record("entry_count", entries.len());
        Ok(entries)
    }

    /// The newest `limit` entries, newest first.
    #[instrument(skip(self), err)]
    pub async fn recent(&self, limit: u32) -> Result<Vec<InventoryLogEntry>, CatalogError> {
        let sql = format!("{SELECT_ENTRIES} ORDER BY log_id DESC LIMIT $1");
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.central.pool())
            .await
            .map_err(|e| CatalogError::read("recent_log", self.central.id(), e))?;
        self.decode_all(&rows)
    }

    fn decode_all(&self, rows: &[AnyRow]) -> Result<Vec<InventoryLogEntry>, CatalogError> {
        rows.iter()
            .map(|row| entry_from_row(row).map_err(|e| CatalogError::corrupt_row(self.central.id(), e)))
            .collect()
    }
}

/// Append inside a caller-owned central transaction.
pub(crate) async fn append_in(
    tx: &mut Tx,
    product_id: ProductId,
    change_type: ChangeType,
    quantity_changed: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO inventory_logs (product_id, change_type, quantity_changed, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(product_id.to_string())
    .bind(change_type.as_str())
    .bind(quantity_changed)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn entry_from_row(row: &AnyRow) -> Result<InventoryLogEntry, String> {
    let product_id: String = row.try_get("product_id").map_err(|e| e.to_string())?;
    let change_type: String = row.try_get("change_type").map_err(|e| e.to_string())?;
    let created_at: String = row.try_get("created_at").map_err(|e| e.to_string())?;

    Ok(InventoryLogEntry {
        log_id: row.try_get::<i64, _>("log_id").map_err(|e| e.to_string())?,
        product_id: product_id.parse::<ProductId>().map_err(|e| e.to_string())?,
        change_type: change_type.parse::<ChangeType>().map_err(|e| e.to_string())?,
        quantity_changed: row.try_get::<i64, _>("quantity_changed").map_err(|e| e.to_string())?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{raw}': {e}"))
}
