//! Catalog domain module.
//!
//! Records (categories, suppliers, products, inventory log entries) and the
//! price-bracket shard router, implemented as deterministic domain logic
//! (no IO, no SQL, no HTTP).

pub mod audit;
pub mod product;
pub mod reference;
pub mod routing;

pub use audit::{ChangeType, InventoryLogEntry};
pub use product::{NewProduct, Product};
pub use reference::{Category, Supplier};
pub use routing::{PriceBracket, RangeSlice, RouteError, ShardRouter};
