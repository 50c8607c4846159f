//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Categories and suppliers are identified by caller-supplied integers,
/// products by a generated identifier; all of them implement this.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
