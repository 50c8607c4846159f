//! Inventory change log records.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use shardcat_core::{DomainError, ProductId};

/// Kind of product mutation recorded in the central log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    StockIn,
    PriceUpdate,
    StockUpdate,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::StockIn => "stock_in",
            ChangeType::PriceUpdate => "price_update",
            ChangeType::StockUpdate => "stock_update",
            ChangeType::Delete => "delete",
        }
    }
}

impl core::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock_in" => Ok(ChangeType::StockIn),
            "price_update" => Ok(ChangeType::PriceUpdate),
            "stock_update" => Ok(ChangeType::StockUpdate),
            "delete" => Ok(ChangeType::Delete),
            other => Err(DomainError::validation(format!("unknown change type '{other}'"))),
        }
    }
}

/// Append-only record of one product mutation. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    pub log_id: i64,
    pub product_id: ProductId,
    pub change_type: ChangeType,
    /// Signed quantity delta; 0 for non-quantity changes.
    pub quantity_changed: i64,
    pub created_at: DateTime<Utc>,
}
