//! `shardcat-core`: foundation building blocks for the sharded catalog.
//!
//! This crate contains **pure** primitives (no storage, no IO): identifiers,
//! the price value object and the domain error model.

pub mod entity;
pub mod error;
pub mod id;
pub mod price;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, ProductId, ShardId, SupplierId};
pub use price::Price;
pub use value_object::ValueObject;
