//! Commit sequencing across two independently transactional stores.
//!
//! There is no atomic commit across stores. Callers stage both transactions,
//! then commit the data store first and the central store second, so a
//! failure leaves at worst a data change without its log entry.
//!
//! A transaction dropped without commit is rolled back by SQLx; explicit
//! [`rollback`] is used where a step fails for a logical reason.

use sqlx::{Any, Transaction};
use tracing::{error, warn};

use shardcat_core::ShardId;

use crate::error::{CatalogError, map_sqlx_error};

pub(crate) type Tx = Transaction<'static, Any>;

/// Failure of [`commit_both`], split by how far it got.
#[derive(Debug)]
pub(crate) enum SplitCommit {
    /// Nothing was committed.
    FirstFailed(CatalogError),
    /// The first store committed; the second rolled back.
    SecondFailed(CatalogError),
}

impl SplitCommit {
    pub(crate) fn into_error(self) -> CatalogError {
        match self {
            SplitCommit::FirstFailed(e) | SplitCommit::SecondFailed(e) => e,
        }
    }
}

pub(crate) async fn rollback(operation: &'static str, tx: Tx, store: &ShardId) {
    if let Err(e) = tx.rollback().await {
        warn!(
            operation,
            store = %store,
            error = %map_sqlx_error("rollback", &e),
            "rollback failed; the connection discards the transaction"
        );
    }
}

/// Commit `first`, then `second`.
///
/// If `first` fails, `second` is rolled back and nothing is visible.
pub(crate) async fn commit_both(
    operation: &'static str,
    first: Tx,
    first_store: &ShardId,
    second: Tx,
    second_store: &ShardId,
) -> Result<(), SplitCommit> {
    if let Err(e) = first.commit().await {
        rollback(operation, second, second_store).await;
        return Err(SplitCommit::FirstFailed(CatalogError::write(
            operation,
            first_store,
            e,
        )));
    }

    if let Err(e) = second.commit().await {
        error!(
            operation,
            committed = %first_store,
            failed = %second_store,
            "second commit failed after first store committed"
        );
        return Err(SplitCommit::SecondFailed(CatalogError::WriteFailure {
            operation,
            shards: vec![second_store.clone()],
            message: format!(
                "{}; changes on '{first_store}' were already committed",
                map_sqlx_error(operation, &e)
            ),
        }));
    }

    Ok(())
}
