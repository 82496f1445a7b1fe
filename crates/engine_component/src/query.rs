//! Query descriptors for system data access declarations.
//!
//! A [`QueryDescriptor`] declares which component types a system reads and
//! writes. Its [`signature`](QueryDescriptor::signature) is the minimal type
//! set an entity must hold to be visited.

use crate::archetype::Signature;
use crate::component::{Component, ComponentTypeId};

/// Describes the data access requirements of a system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Component types the system reads immutably.
    pub reads: Vec<ComponentTypeId>,
    /// Component types the system writes (mutable access).
    pub writes: Vec<ComponentTypeId>,
}

impl QueryDescriptor {
    /// Create a new empty query descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, type_id: ComponentTypeId) -> Self {
        self.reads.push(type_id);
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write(mut self, type_id: ComponentTypeId) -> Self {
        self.writes.push(type_id);
        self
    }

    /// Add a read-only requirement on `T`.
    #[must_use]
    pub fn reading<T: Component>(self) -> Self {
        self.read(T::component_type_id())
    }

    /// Add a mutable requirement on `T`.
    #[must_use]
    pub fn writing<T: Component>(self) -> Self {
        self.write(T::component_type_id())
    }

    /// Fold another descriptor's requirements into this one.
    #[must_use]
    pub fn merge(mut self, other: QueryDescriptor) -> Self {
        self.reads.extend(other.reads);
        self.writes.extend(other.writes);
        self
    }

    /// Returns all component types that this query accesses (reads + writes).
    #[must_use]
    pub fn accessed_types(&self) -> Vec<ComponentTypeId> {
        let mut types = Vec::with_capacity(self.reads.len() + self.writes.len());
        types.extend_from_slice(&self.reads);
        types.extend_from_slice(&self.writes);
        types
    }

    /// The signature an entity must be a superset of to match.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature::from_types(self.accessed_types())
    }

    /// Returns `true` if the query never writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_covers_reads_and_writes() {
        let transform = ComponentTypeId(1);
        let velocity = ComponentTypeId(2);

        let q = QueryDescriptor::new().read(velocity).write(transform);

        assert_eq!(q.signature(), Signature::from_types([transform, velocity]));
        assert!(!q.is_read_only());
        assert_eq!(q.accessed_types(), vec![velocity, transform]);
    }

    #[test]
    fn test_merge_concatenates() {
        let a = ComponentTypeId(1);
        let b = ComponentTypeId(2);

        let q = QueryDescriptor::new()
            .read(a)
            .merge(QueryDescriptor::new().read(b));

        assert_eq!(q.reads, vec![a, b]);
        assert!(q.is_read_only());
    }

    #[test]
    fn test_empty_descriptor_matches_everything() {
        assert!(QueryDescriptor::new().signature().is_empty());
    }
}
