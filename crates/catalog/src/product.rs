//! Product records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shardcat_core::{CategoryId, DomainError, DomainResult, Entity, Price, ProductId, ShardId, SupplierId};

/// Input for creating a product. The identifier is generated by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock_quantity: i64,
    pub category_id: CategoryId,
    pub supplier_id: SupplierId,
}

impl NewProduct {
    /// Reject out-of-contract input before any storage access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.stock_quantity < 0 {
            return Err(DomainError::validation(format!(
                "initial stock must be non-negative, got {}",
                self.stock_quantity
            )));
        }
        Ok(())
    }
}

/// A product as read back from its shard, joined with reference names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock_quantity: i64,
    pub category_id: CategoryId,
    pub supplier_id: SupplierId,
    /// `None` when the category row is missing from this shard's replica.
    pub category_name: Option<String>,
    pub supplier_name: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// Shard the row was read from.
    pub shard: ShardId,
}

impl Product {
    /// Stock level after applying `delta`.
    ///
    /// Stock never goes below zero: a delta that would drive it negative is
    /// rejected rather than clamped.
    pub fn stock_after(&self, delta: i64) -> DomainResult<i64> {
        let next = self.stock_quantity.checked_add(delta).ok_or_else(|| {
            DomainError::validation(format!("stock delta {delta} overflows"))
        })?;
        if next < 0 {
            return Err(DomainError::validation(format!(
                "stock for product {} would become negative ({} {:+})",
                self.id, self.stock_quantity, delta
            )));
        }
        Ok(next)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
