//! Table definitions.
//!
//! Every product shard holds its own replica of `categories` and `suppliers`
//! so products can be joined locally. The central store holds the audit log
//! and the pending-migration markers.
//!
//! Only `BIGINT` and `TEXT` columns are used so the same statements run on
//! Postgres and SQLite. Identifiers are hyphenated UUID text, timestamps are
//! RFC 3339 text, prices are integer cents.

use super::Dialect;

pub(crate) const SHARD_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        category_id BIGINT PRIMARY KEY,
        category_name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS suppliers (
        supplier_id BIGINT PRIMARY KEY,
        supplier_name TEXT NOT NULL,
        contact_info TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        product_id TEXT PRIMARY KEY,
        product_name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
        stock_quantity BIGINT NOT NULL CHECK (stock_quantity >= 0),
        category_id BIGINT NOT NULL REFERENCES categories (category_id),
        supplier_id BIGINT NOT NULL REFERENCES suppliers (supplier_id),
        last_updated TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS products_price_idx ON products (price_cents)",
];

const LOG_COLUMNS: &str = r#"
        product_id TEXT NOT NULL,
        change_type TEXT NOT NULL
            CHECK (change_type IN ('stock_in', 'price_update', 'stock_update', 'delete')),
        quantity_changed BIGINT NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
"#;

const PENDING_MIGRATIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS pending_migrations (
        product_id TEXT PRIMARY KEY,
        from_shard TEXT NOT NULL,
        to_shard TEXT NOT NULL,
        new_price_cents BIGINT NOT NULL,
        started_at TEXT NOT NULL
    )
"#;

const LOG_PRODUCT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS inventory_logs_product_idx ON inventory_logs (product_id)";

/// Central-store statements. Only the log's surrogate key differs by backend.
pub(crate) fn central_tables(dialect: Dialect) -> Vec<String> {
    let log_id = match dialect {
        Dialect::Postgres => "log_id BIGSERIAL PRIMARY KEY",
        Dialect::Sqlite => "log_id INTEGER PRIMARY KEY AUTOINCREMENT",
    };
    vec![
        format!("CREATE TABLE IF NOT EXISTS inventory_logs (\n        {log_id},{LOG_COLUMNS})"),
        LOG_PRODUCT_INDEX.to_string(),
        PENDING_MIGRATIONS.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_key_follows_dialect() {
        let pg = central_tables(Dialect::Postgres);
        let lite = central_tables(Dialect::Sqlite);
        assert!(pg[0].contains("BIGSERIAL"));
        assert!(lite[0].contains("AUTOINCREMENT"));
        assert!(pg.iter().any(|s| s.contains("pending_migrations")));
    }
}
