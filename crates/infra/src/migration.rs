//! Migration Coordinator: price changes, including moves between shards.
//!
//! ## Cross-shard moves
//!
//! When a new price routes to a different shard the product row is copied to
//! the target and deleted from the source. There is no atomic commit across
//! stores, so the move is made recoverable instead:
//!
//! 1. A `pending_migrations` marker is written to the central store.
//! 2. Target upsert and source delete are staged in their own transactions.
//! 3. Target commits, then source commits.
//! 4. One central transaction appends `price_update` and clears the marker.
//!
//! A failure before step 3 rolls everything back and clears the marker. A
//! failure after the target commit leaves the marker in place; the product is
//! then at worst duplicated, never lost, and [`MigrationCoordinator::reconcile`]
//! finishes the move.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::{Span, error, info, instrument, warn};

use shardcat_catalog::{ChangeType, Product, ShardRouter};
use shardcat_core::{Price, ProductId, ShardId};

use crate::audit_log::{append_in, parse_timestamp};
use crate::error::CatalogError;
use crate::product_store::{ProductStore, delete_in, fetch_on, upsert_in};
use crate::shard::{ShardSet, Store};
use crate::txn::{SplitCommit, Tx, commit_both, rollback};

/// A cross-shard move that was started but not confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub product_id: ProductId,
    pub from_shard: ShardId,
    pub to_shard: ShardId,
    pub new_price: Price,
    pub started_at: DateTime<Utc>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Moves finished and logged.
    pub completed: Vec<ProductId>,
    /// Markers whose product no longer exists anywhere.
    pub abandoned: Vec<ProductId>,
    /// Stray copies removed, with the shard they were removed from.
    pub duplicates_removed: Vec<(ProductId, ShardId)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.completed.is_empty() && self.abandoned.is_empty() && self.duplicates_removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MigrationCoordinator {
    shards: Arc<ShardSet>,
    router: Arc<ShardRouter>,
    products: ProductStore,
}

impl MigrationCoordinator {
    pub fn new(shards: Arc<ShardSet>, router: Arc<ShardRouter>, products: ProductStore) -> Self {
        Self {
            shards,
            router,
            products,
        }
    }

    /// Change a product's price, moving it if the bracket changes.
    ///
    /// Returns `false` if the product does not exist.
    #[instrument(
        skip(self),
        fields(
            product_id = %id,
            new_price = %new_price,
            from_shard = tracing::field::Empty,
            to_shard = tracing::field::Empty
        ),
        err
    )]
    pub async fn update_price(&self, id: ProductId, new_price: Price) -> Result<bool, CatalogError> {
        let Some(current) = self.products.get_by_id(id).await? else {
            return Ok(false);
        };

        let routed = self.router.route(current.price)?;
        if routed != &current.shard {
            warn!(
                routed = %routed,
                found = %current.shard,
                "product stored outside its bracket; moving from where it was found"
            );
        }
        let source = self.shards.shard(&current.shard)?;
        let target = self.shards.shard(self.router.route(new_price)?)?;

        let span = Span::current();
        span.record("from_shard", source.id().as_str());
        span.record("to_shard", target.id().as_str());

        if source.id() == target.id() {
            self.reprice_in_place(source, id, new_price).await
        } else {
            self.move_between(&current, source, target, new_price).await
        }
    }

    async fn reprice_in_place(
        &self,
        store: &Store,
        id: ProductId,
        new_price: Price,
    ) -> Result<bool, CatalogError> {
        const OP: &str = "update_price";
        let central = self.shards.central();

        let mut shard_tx = store.begin(OP).await?;
        let updated = sqlx::query(
            "UPDATE products SET price_cents = $1, last_updated = $2 WHERE product_id = $3",
        )
        .bind(new_price.cents())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *shard_tx)
        .await
        .map_err(|e| CatalogError::write(OP, store.id(), e))?
        .rows_affected();

        if updated == 0 {
            rollback(OP, shard_tx, store.id()).await;
            return Ok(false);
        }

        let mut central_tx = central.begin(OP).await?;
        append_in(&mut central_tx, id, ChangeType::PriceUpdate, 0)
            .await
            .map_err(|e| CatalogError::write(OP, central.id(), e))?;

        commit_both(OP, shard_tx, store.id(), central_tx, central.id())
            .await
            .map_err(SplitCommit::into_error)?;
        info!("price updated in place");
        Ok(true)
    }

    async fn move_between(
        &self,
        current: &Product,
        source: &Store,
        target: &Store,
        new_price: Price,
    ) -> Result<bool, CatalogError> {
        const OP: &str = "update_price";
        let id = current.id;

        self.mark_pending(id, source.id(), target.id(), new_price).await?;

        let (mut target_tx, mut source_tx) = match self.begin_pair(OP, source, target).await {
            Ok(pair) => pair,
            Err(err) => return Err(self.abort_move(id, err).await),
        };
        if let Err(e) = upsert_in(&mut target_tx, current, new_price).await {
            rollback(OP, source_tx, source.id()).await;
            rollback(OP, target_tx, target.id()).await;
            return Err(self.abort_move(id, CatalogError::write(OP, target.id(), e)).await);
        }

        match delete_in(&mut source_tx, id).await {
            Ok(0) => {
                // Deleted or moved by someone else since the lookup.
                rollback(OP, source_tx, source.id()).await;
                rollback(OP, target_tx, target.id()).await;
                self.clear_pending(id).await?;
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) => {
                rollback(OP, source_tx, source.id()).await;
                rollback(OP, target_tx, target.id()).await;
                return Err(self.abort_move(id, CatalogError::write(OP, source.id(), e)).await);
            }
        }

        match commit_both(OP, target_tx, target.id(), source_tx, source.id()).await {
            Ok(()) => {}
            Err(SplitCommit::FirstFailed(err)) => return Err(self.abort_move(id, err).await),
            Err(SplitCommit::SecondFailed(err)) => {
                error!(
                    product_id = %id,
                    from_shard = %source.id(),
                    to_shard = %target.id(),
                    "product now exists in both shards; pending migration left for reconcile"
                );
                return Err(err);
            }
        }

        self.confirm(id).await.map_err(|err| {
            warn!(product_id = %id, "move committed but not logged; pending migration left for reconcile");
            err
        })?;
        info!("product moved between shards");
        Ok(true)
    }

    /// Begin `(target, source)` transactions, acquiring the two shards in
    /// bracket order so opposite moves cannot each hold one and wait on the
    /// other. A transaction already begun is rolled back on drop.
    async fn begin_pair(
        &self,
        operation: &'static str,
        source: &Store,
        target: &Store,
    ) -> Result<(Tx, Tx), CatalogError> {
        if self.shards.bracket_index(source.id()) < self.shards.bracket_index(target.id()) {
            let source_tx = source.begin(operation).await?;
            let target_tx = target.begin(operation).await?;
            Ok((target_tx, source_tx))
        } else {
            let target_tx = target.begin(operation).await?;
            let source_tx = source.begin(operation).await?;
            Ok((target_tx, source_tx))
        }
    }

    /// Record the move before touching either shard. Replaces a stale marker.
    async fn mark_pending(
        &self,
        id: ProductId,
        from: &ShardId,
        to: &ShardId,
        new_price: Price,
    ) -> Result<(), CatalogError> {
        let central = self.shards.central();
        sqlx::query(
            r#"
            INSERT INTO pending_migrations (product_id, from_shard, to_shard, new_price_cents, started_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id) DO UPDATE SET
                from_shard = excluded.from_shard,
                to_shard = excluded.to_shard,
                new_price_cents = excluded.new_price_cents,
                started_at = excluded.started_at
            "#,
        )
        .bind(id.to_string())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(new_price.cents())
        .bind(Utc::now().to_rfc3339())
        .execute(central.pool())
        .await
        .map_err(|e| CatalogError::write("update_price", central.id(), e))?;
        Ok(())
    }

    async fn clear_pending(&self, id: ProductId) -> Result<(), CatalogError> {
        let central = self.shards.central();
        sqlx::query("DELETE FROM pending_migrations WHERE product_id = $1")
            .bind(id.to_string())
            .execute(central.pool())
            .await
            .map_err(|e| CatalogError::write("update_price", central.id(), e))?;
        Ok(())
    }

    /// Nothing was committed on either shard: drop the marker and pass `err` on.
    async fn abort_move(&self, id: ProductId, err: CatalogError) -> CatalogError {
        if let Err(clear_err) = self.clear_pending(id).await {
            warn!(product_id = %id, error = %clear_err, "could not clear pending migration after rollback");
        }
        err
    }

    /// Log `price_update` and clear the marker in one central transaction.
    async fn confirm(&self, id: ProductId) -> Result<(), CatalogError> {
        const OP: &str = "update_price";
        let central = self.shards.central();
        let mut tx = central.begin(OP).await?;
        confirm_in(&mut tx, id)
            .await
            .map_err(|e| CatalogError::write(OP, central.id(), e))?;
        tx.commit()
            .await
            .map_err(|e| CatalogError::write(OP, central.id(), e))
    }

    /// Moves that were started but never confirmed.
    #[instrument(skip(self), err)]
    pub async fn pending(&self) -> Result<Vec<PendingMigration>, CatalogError> {
        let central = self.shards.central();
        let rows = sqlx::query(
            r#"
            SELECT product_id, from_shard, to_shard, new_price_cents, started_at
            FROM pending_migrations
            ORDER BY started_at, product_id
            "#,
        )
        .fetch_all(central.pool())
        .await
        .map_err(|e| CatalogError::read("pending_migrations", central.id(), e))?;

        rows.iter()
            .map(|row| pending_from_row(row).map_err(|e| CatalogError::corrupt_row(central.id(), e)))
            .collect()
    }

    /// Finish every interrupted move, then remove stray duplicate copies.
    ///
    /// Idempotent: a second pass over a clean catalog changes nothing.
    #[instrument(skip(self), err)]
    pub async fn reconcile(&self) -> Result<ReconcileReport, CatalogError> {
        let mut report = ReconcileReport::default();

        for pending in self.pending().await? {
            if self.resume(&pending).await? {
                report.completed.push(pending.product_id);
            } else {
                report.abandoned.push(pending.product_id);
            }
        }

        report.duplicates_removed = self.remove_duplicates().await?;

        if report.is_clean() {
            info!("nothing to reconcile");
        } else {
            info!(
                completed = report.completed.len(),
                abandoned = report.abandoned.len(),
                duplicates_removed = report.duplicates_removed.len(),
                "reconciliation finished"
            );
        }
        Ok(report)
    }

    /// Returns `false` when the product vanished and the marker was dropped.
    async fn resume(&self, pending: &PendingMigration) -> Result<bool, CatalogError> {
        const OP: &str = "reconcile_migrations";
        let id = pending.product_id;
        let source = self.shards.shard(&pending.from_shard)?;
        let target = self.shards.shard(&pending.to_shard)?;

        let in_source = fetch_on(source, id).await?;
        let in_target = fetch_on(target, id).await?;

        if in_source.is_none() && in_target.is_none() {
            warn!(product_id = %id, "pending migration for a product that no longer exists");
            self.clear_pending(id).await?;
            return Ok(false);
        }

        if let Some(source_row) = &in_source {
            // The source stays live until the marker clears and may have taken
            // writes since the target copy was made. It wins unless the target
            // copy was written after it.
            let target_is_newer = in_target
                .as_ref()
                .is_some_and(|t| t.last_updated > source_row.last_updated);
            if !target_is_newer {
                let mut tx = target.begin(OP).await?;
                upsert_in(&mut tx, source_row, pending.new_price)
                    .await
                    .map_err(|e| CatalogError::write(OP, target.id(), e))?;
                tx.commit()
                    .await
                    .map_err(|e| CatalogError::write(OP, target.id(), e))?;
            }

            let mut tx = source.begin(OP).await?;
            delete_in(&mut tx, id)
                .await
                .map_err(|e| CatalogError::write(OP, source.id(), e))?;
            tx.commit()
                .await
                .map_err(|e| CatalogError::write(OP, source.id(), e))?;
        }

        self.confirm(id).await?;
        info!(
            product_id = %id,
            from_shard = %source.id(),
            to_shard = %target.id(),
            "pending migration completed"
        );
        Ok(true)
    }

    /// Keep the copy whose shard matches its price; delete the rest.
    async fn remove_duplicates(&self) -> Result<Vec<(ProductId, ShardId)>, CatalogError> {
        const OP: &str = "reconcile_migrations";
        let mut copies: BTreeMap<ProductId, Vec<Product>> = BTreeMap::new();
        for product in self.products.list_all().await? {
            copies.entry(product.id).or_default().push(product);
        }

        let mut removed = Vec::new();
        for (id, found) in copies.into_iter().filter(|(_, found)| found.len() > 1) {
            // Fall back to the first copy in bracket order if none is routed home.
            let keep = found
                .iter()
                .position(|p| self.router.route(p.price).is_ok_and(|s| s == &p.shard))
                .unwrap_or(0);

            for (idx, stray) in found.iter().enumerate() {
                if idx == keep {
                    continue;
                }
                let store = self.shards.shard(&stray.shard)?;
                let mut tx = store.begin(OP).await?;
                delete_in(&mut tx, id)
                    .await
                    .map_err(|e| CatalogError::write(OP, store.id(), e))?;
                tx.commit()
                    .await
                    .map_err(|e| CatalogError::write(OP, store.id(), e))?;
                warn!(product_id = %id, shard = %store.id(), "duplicate copy removed");
                removed.push((id, store.id().clone()));
            }
        }
        Ok(removed)
    }
}

async fn confirm_in(tx: &mut Tx, id: ProductId) -> Result<(), sqlx::Error> {
    append_in(tx, id, ChangeType::PriceUpdate, 0).await?;
    sqlx::query("DELETE FROM pending_migrations WHERE product_id = $1")
        .bind(id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn pending_from_row(row: &AnyRow) -> Result<PendingMigration, String> {
    let text = |col: &str| row.try_get::<String, _>(col).map_err(|e| e.to_string());
    let cents: i64 = row.try_get("new_price_cents").map_err(|e| e.to_string())?;

    Ok(PendingMigration {
        product_id: text("product_id")?
            .parse::<ProductId>()
            .map_err(|e| e.to_string())?,
        from_shard: ShardId::new(text("from_shard")?),
        to_shard: ShardId::new(text("to_shard")?),
        new_price: Price::from_cents(cents).map_err(|e| e.to_string())?,
        started_at: parse_timestamp(&text("started_at")?)?,
    })
}
