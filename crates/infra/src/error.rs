//! Catalog error type and SQLx error mapping.
//!
//! ## Error Mapping
//!
//! SQLx errors never leave this crate as-is. They are folded into a message
//! and attached to the shard (or shards) that failed:
//!
//! | SQLx Error | Code | Message prefix |
//! |------------|------|----------------|
//! | Database (unique violation) | `23505` / SQLite `2067`, `1555` | `duplicate key` |
//! | Database (foreign key violation) | `23503` / SQLite `787` | `missing reference` |
//! | Database (check constraint violation) | `23514` / SQLite `275` | `constraint violated` |
//! | Database (other) | any | `database error` |
//! | PoolClosed | n/a | `connection pool closed` |
//! | Other | n/a | `sqlx error` |

use std::fmt;

use thiserror::Error;

use shardcat_catalog::RouteError;
use shardcat_core::{DomainError, ShardId};

/// A write that failed on one shard during a fan-out operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
    pub shard: ShardId,
    pub message: String,
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.shard, self.message)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Bad bracket table, unknown shard or unreachable store at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller input out of contract. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A price no bracket contains.
    #[error(transparent)]
    OutOfRange(#[from] RouteError),

    /// A single-product write failed. Every transaction it opened was rolled
    /// back, except where `message` says a later step could not be undone.
    #[error("{operation} failed on [{}]: {message}", join(.shards))]
    WriteFailure {
        operation: &'static str,
        shards: Vec<ShardId>,
        message: String,
    },

    /// A replicated write reached only some shards.
    #[error(
        "{operation} failed on {} shard(s) [{}], succeeded on [{}]",
        .failed.len(),
        join_failures(.failed),
        join(.succeeded)
    )]
    AggregateWriteFailure {
        operation: &'static str,
        succeeded: Vec<ShardId>,
        failed: Vec<ShardFailure>,
    },

    /// A read against one shard failed. Reads never return partial results.
    #[error("read from '{shard}' failed: {message}")]
    ReadFailure { shard: ShardId, message: String },
}

impl CatalogError {
    pub(crate) fn write(operation: &'static str, shard: &ShardId, err: sqlx::Error) -> Self {
        CatalogError::WriteFailure {
            operation,
            shards: vec![shard.clone()],
            message: map_sqlx_error(operation, &err),
        }
    }

    pub(crate) fn read(operation: &'static str, shard: &ShardId, err: sqlx::Error) -> Self {
        CatalogError::ReadFailure {
            shard: shard.clone(),
            message: map_sqlx_error(operation, &err),
        }
    }

    /// A row that was stored but cannot be decoded back into a domain value.
    pub(crate) fn corrupt_row(shard: &ShardId, message: impl Into<String>) -> Self {
        CatalogError::ReadFailure {
            shard: shard.clone(),
            message: format!("corrupt row: {}", message.into()),
        }
    }
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Configuration(msg) => CatalogError::Configuration(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CatalogError::Validation(msg)
            }
        }
    }
}

fn join(shards: &[ShardId]) -> String {
    shards
        .iter()
        .map(ShardId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_failures(failed: &[ShardFailure]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render a SQLx error as a message tagged with the failing operation.
pub(crate) fn map_sqlx_error(operation: &str, err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => {
            let kind = match db_err.code().as_deref() {
                Some("23505") | Some("2067") | Some("1555") => "duplicate key",
                Some("23503") | Some("787") => "missing reference",
                Some("23514") | Some("275") => "constraint violated",
                _ => "database error",
            };
            format!("{kind} in {operation}: {}", db_err.message())
        }
        sqlx::Error::PoolClosed => format!("connection pool closed in {operation}"),
        sqlx::Error::RowNotFound => format!("unexpected row not found in {operation}"),
        other => format!("sqlx error in {operation}: {other}"),
    }
}
