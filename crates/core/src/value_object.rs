//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one. `Price` is the main example in this
/// workspace: two prices with the same number of cents are the same price.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
