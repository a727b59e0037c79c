//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Implemented by every persisted record (products, sales, returns, ...) so
/// stores and tests can address them uniformly by id.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Index a slice of entities by id.
pub fn index_by_id<E>(entities: &[E]) -> std::collections::HashMap<E::Id, &E>
where
    E: Entity,
{
    entities.iter().map(|e| (e.id().clone(), e)).collect()
}
