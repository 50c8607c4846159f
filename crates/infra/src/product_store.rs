//! Product Store: product rows live in exactly one shard, chosen by price.
//!
//! ## Write protocol
//!
//! Every mutation stages a shard transaction and a central transaction
//! (holding the audit entry), then commits the shard first and the central
//! store second. Any failure before the first commit rolls back both.
//!
//! ## Reads
//!
//! Point lookups scan shards in bracket order and stop at the first hit.
//! Range queries touch only the shards whose bracket intersects the range.
//! A failed shard read fails the whole call; partial results are never
//! returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::{Span, debug, error, info, instrument};

use shardcat_catalog::{ChangeType, NewProduct, Product, ShardRouter};
use shardcat_core::{CategoryId, Price, ProductId, ShardId, SupplierId};

use crate::audit_log::{append_in, parse_timestamp};
use crate::error::CatalogError;
use crate::shard::{ShardSet, Store};
use crate::txn::{SplitCommit, Tx, commit_both, rollback};

const PRODUCT_SELECT: &str = r#"
    SELECT
        p.product_id,
        p.product_name,
        p.description,
        p.price_cents,
        p.stock_quantity,
        p.category_id,
        p.supplier_id,
        p.last_updated,
        c.category_name,
        s.supplier_name
    FROM products p
    LEFT JOIN categories c ON c.category_id = p.category_id
    LEFT JOIN suppliers s ON s.supplier_id = p.supplier_id
"#;

#[derive(Debug, Clone)]
pub struct ProductStore {
    shards: Arc<ShardSet>,
    router: Arc<ShardRouter>,
}

impl ProductStore {
    pub fn new(shards: Arc<ShardSet>, router: Arc<ShardRouter>) -> Self {
        Self { shards, router }
    }

    /// Create a product in the shard its price routes to and log `stock_in`.
    ///
    /// If the shard commits but the log does not, the row is deleted again so
    /// the returned error never leaves a live identifier behind.
    #[instrument(
        skip(self, input),
        fields(shard = tracing::field::Empty, product_id = tracing::field::Empty),
        err
    )]
    pub async fn add_product(&self, input: NewProduct) -> Result<ProductId, CatalogError> {
        const OP: &str = "add_product";
        input.validate()?;

        let shard_id = self.router.route(input.price)?;
        let store = self.shards.shard(shard_id)?;
        let central = self.shards.central();

        let product_id = ProductId::new();
        let span = Span::current();
        span.record("shard", shard_id.as_str());
        span.record("product_id", tracing::field::display(product_id));

        let mut shard_tx = store.begin(OP).await?;
        let mut central_tx = central.begin(OP).await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                product_id, product_name, description, price_cents,
                stock_quantity, category_id, supplier_id, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product_id.to_string())
        .bind(input.name.as_str())
        .bind(input.description.as_str())
        .bind(input.price.cents())
        .bind(input.stock_quantity)
        .bind(input.category_id.get())
        .bind(input.supplier_id.get())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *shard_tx)
        .await
        .map_err(|e| CatalogError::write(OP, store.id(), e))?;

        append_in(&mut central_tx, product_id, ChangeType::StockIn, input.stock_quantity)
            .await
            .map_err(|e| CatalogError::write(OP, central.id(), e))?;

        match commit_both(OP, shard_tx, store.id(), central_tx, central.id()).await {
            Ok(()) => {
                info!(price = %input.price, stock = input.stock_quantity, "product added");
                Ok(product_id)
            }
            Err(SplitCommit::FirstFailed(err)) => Err(err),
            Err(SplitCommit::SecondFailed(err)) => {
                self.compensate_add(store, product_id).await;
                Err(err)
            }
        }
    }

    async fn compensate_add(&self, store: &Store, product_id: ProductId) {
        let undone = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id.to_string())
            .execute(store.pool())
            .await;
        match undone {
            Ok(_) => info!(shard = %store.id(), %product_id, "compensating delete applied"),
            Err(e) => error!(
                shard = %store.id(),
                %product_id,
                error = %e,
                "compensating delete failed; product exists without a stock_in entry"
            ),
        }
    }

    /// Scan shards in bracket order; the first match wins.
    #[instrument(skip(self), fields(product_id = %id, shard = tracing::field::Empty), err)]
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        for store in self.shards.shards() {
            if let Some(product) = fetch_on(store, id).await? {
                Span::current().record("shard", store.id().as_str());
                return Ok(Some(product));
            }
        }
        Ok(None)
    }

    /// Products with `min <= price < max`, shards in bracket order.
    #[instrument(skip(self), fields(min = %min, max = %max, shards_touched = tracing::field::Empty), err)]
    pub async fn get_by_price_range(
        &self,
        min: Price,
        max: Price,
    ) -> Result<Vec<Product>, CatalogError> {
        let slices = self.router.slices(min, max)?;
        Span::current().record("shards_touched", slices.len());

        let sql = format!(
            "{PRODUCT_SELECT} WHERE p.price_cents >= $1 AND p.price_cents < $2 ORDER BY p.product_id"
        );
        let mut products = Vec::new();
        for slice in &slices {
            let store = self.shards.shard(&slice.shard)?;
            let rows = sqlx::query(&sql)
                .bind(slice.low.cents())
                .bind(slice.high.cents())
                .fetch_all(store.pool())
                .await
                .map_err(|e| CatalogError::read("get_by_price_range", store.id(), e))?;
            products.extend(decode_products(store, &rows)?);
        }
        Ok(products)
    }

    /// Every product in every shard, shards in bracket order.
    #[instrument(skip(self), err)]
    pub async fn list_all(&self) -> Result<Vec<Product>, CatalogError> {
        let sql = format!("{PRODUCT_SELECT} ORDER BY p.product_id");
        let mut products = Vec::new();
        for store in self.shards.shards() {
            let rows = sqlx::query(&sql)
                .fetch_all(store.pool())
                .await
                .map_err(|e| CatalogError::read("list_all", store.id(), e))?;
            products.extend(decode_products(store, &rows)?);
        }
        Ok(products)
    }

    /// Apply a signed stock delta and log `stock_update`.
    ///
    /// Returns `false` if the product does not exist. A delta that would take
    /// stock below zero is a validation error and writes nothing.
    #[instrument(skip(self), fields(product_id = %id, shard = tracing::field::Empty), err)]
    pub async fn update_stock(&self, id: ProductId, delta: i64) -> Result<bool, CatalogError> {
        const OP: &str = "update_stock";
        let Some(current) = self.get_by_id(id).await? else {
            return Ok(false);
        };
        current.stock_after(delta)?;

        let store = self.shards.shard(&current.shard)?;
        let central = self.shards.central();
        Span::current().record("shard", store.id().as_str());

        let mut shard_tx = store.begin(OP).await?;
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $1, last_updated = $2
            WHERE product_id = $3 AND stock_quantity + $1 >= 0
            "#,
        )
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *shard_tx)
        .await
        .map_err(|e| CatalogError::write(OP, store.id(), e))?
        .rows_affected();

        if updated == 0 {
            // Moved, deleted or drained since the lookup.
            let still_here = exists_in(&mut shard_tx, id)
                .await
                .map_err(|e| CatalogError::write(OP, store.id(), e))?;
            rollback(OP, shard_tx, store.id()).await;
            return if still_here {
                Err(CatalogError::Validation(format!(
                    "stock for product {id} would become negative"
                )))
            } else {
                Ok(false)
            };
        }

        let mut central_tx = central.begin(OP).await?;
        append_in(&mut central_tx, id, ChangeType::StockUpdate, delta)
            .await
            .map_err(|e| CatalogError::write(OP, central.id(), e))?;

        commit_both(OP, shard_tx, store.id(), central_tx, central.id())
            .await
            .map_err(SplitCommit::into_error)?;
        debug!(delta, "stock updated");
        Ok(true)
    }

    /// Remove a product and log `delete`. Returns `false` if it does not exist.
    #[instrument(skip(self), fields(product_id = %id, shard = tracing::field::Empty), err)]
    pub async fn delete_product(&self, id: ProductId) -> Result<bool, CatalogError> {
        const OP: &str = "delete_product";
        let Some(current) = self.get_by_id(id).await? else {
            return Ok(false);
        };

        let store = self.shards.shard(&current.shard)?;
        let central = self.shards.central();
        Span::current().record("shard", store.id().as_str());

        let mut shard_tx = store.begin(OP).await?;
        let deleted = delete_in(&mut shard_tx, id)
            .await
            .map_err(|e| CatalogError::write(OP, store.id(), e))?;
        if deleted == 0 {
            rollback(OP, shard_tx, store.id()).await;
            return Ok(false);
        }

        let mut central_tx = central.begin(OP).await?;
        append_in(&mut central_tx, id, ChangeType::Delete, 0)
            .await
            .map_err(|e| CatalogError::write(OP, central.id(), e))?;

        commit_both(OP, shard_tx, store.id(), central_tx, central.id())
            .await
            .map_err(SplitCommit::into_error)?;
        info!("product deleted");
        Ok(true)
    }

    /// Row count per shard. Every configured shard appears, even when empty.
    #[instrument(skip(self), err)]
    pub async fn shard_counts(&self) -> Result<BTreeMap<ShardId, u64>, CatalogError> {
        let mut counts = BTreeMap::new();
        for store in self.shards.shards() {
            let count: i64 = sqlx::query("SELECT COUNT(*) AS product_count FROM products")
                .fetch_one(store.pool())
                .await
                .and_then(|row| row.try_get("product_count"))
                .map_err(|e| CatalogError::read("shard_counts", store.id(), e))?;
            counts.insert(store.id().clone(), u64::try_from(count).unwrap_or_default());
        }
        Ok(counts)
    }
}

/// Point lookup on a single shard.
pub(crate) async fn fetch_on(store: &Store, id: ProductId) -> Result<Option<Product>, CatalogError> {
    let sql = format!("{PRODUCT_SELECT} WHERE p.product_id = $1");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(store.pool())
        .await
        .map_err(|e| CatalogError::read("get_by_id", store.id(), e))?;
    row.map(|row| product_from_row(&row, store.id()).map_err(|e| CatalogError::corrupt_row(store.id(), e)))
        .transpose()
}

/// Insert `product` with `price`, or overwrite an existing row with the same id.
pub(crate) async fn upsert_in(tx: &mut Tx, product: &Product, price: Price) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO products (
            product_id, product_name, description, price_cents,
            stock_quantity, category_id, supplier_id, last_updated
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (product_id) DO UPDATE SET
            product_name = excluded.product_name,
            description = excluded.description,
            price_cents = excluded.price_cents,
            stock_quantity = excluded.stock_quantity,
            category_id = excluded.category_id,
            supplier_id = excluded.supplier_id,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(product.id.to_string())
    .bind(product.name.as_str())
    .bind(product.description.as_str())
    .bind(price.cents())
    .bind(product.stock_quantity)
    .bind(product.category_id.get())
    .bind(product.supplier_id.get())
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn delete_in(tx: &mut Tx, id: ProductId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
        .bind(id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

async fn exists_in(tx: &mut Tx, id: ProductId) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT product_id FROM products WHERE product_id = $1")
        .bind(id.to_string())
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.is_some())
}

fn decode_products(store: &Store, rows: &[AnyRow]) -> Result<Vec<Product>, CatalogError> {
    rows.iter()
        .map(|row| {
            product_from_row(row, store.id()).map_err(|e| CatalogError::corrupt_row(store.id(), e))
        })
        .collect()
}

fn product_from_row(row: &AnyRow, shard: &ShardId) -> Result<Product, String> {
    let get_i64 = |col: &str| row.try_get::<i64, _>(col).map_err(|e| e.to_string());
    let get_text = |col: &str| row.try_get::<String, _>(col).map_err(|e| e.to_string());
    let get_opt_text = |col: &str| row.try_get::<Option<String>, _>(col).map_err(|e| e.to_string());

    Ok(Product {
        id: get_text("product_id")?
            .parse::<ProductId>()
            .map_err(|e| e.to_string())?,
        name: get_text("product_name")?,
        description: get_text("description")?,
        price: Price::from_cents(get_i64("price_cents")?).map_err(|e| e.to_string())?,
        stock_quantity: get_i64("stock_quantity")?,
        category_id: CategoryId::new(get_i64("category_id")?).map_err(|e| e.to_string())?,
        supplier_id: SupplierId::new(get_i64("supplier_id")?).map_err(|e| e.to_string())?,
        category_name: get_opt_text("category_name")?,
        supplier_name: get_opt_text("supplier_name")?,
        last_updated: parse_timestamp(&get_text("last_updated")?)?,
        shard: shard.clone(),
    })
}
