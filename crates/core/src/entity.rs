//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Stock moves and picking types are entities: they keep their identity while
/// quantities and states change, and they are owned by (or configure) an
/// aggregate rather than being aggregates themselves.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
