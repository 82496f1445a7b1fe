//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data. It
//! keys into component columns and into exactly one archetype group.

/// A unique entity identifier.
///
/// Entities are pure identifiers; they carry no data of their own. Components
/// are attached to entities to give them meaning.
///
/// Identifiers are handed out monotonically by an [`EntityAllocator`] and are
/// never reused within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub u64);

impl Entity {
    /// The null / invalid entity sentinel.
    pub const INVALID: Entity = Entity(0);

    /// Create an entity from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns the entity `offset` positions after this one.
    ///
    /// Bulk creation hands out contiguous ranges, so the first id plus an
    /// offset addresses every member of the range.
    #[must_use]
    pub const fn offset(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// The tracker owns exactly one allocator and it is the single source of truth
/// for entity identity. Destroyed IDs are never recycled.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is reserved for [`Entity::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&mut self) -> Entity {
        let id = self.next_id;
        self.next_id += 1;
        Entity(id)
    }

    /// Allocates `count` contiguous entity IDs and returns the first one.
    ///
    /// A `count` of zero reserves nothing and returns the next ID that would
    /// have been handed out.
    pub fn allocate_range(&mut self, count: u64) -> Entity {
        let first = self.next_id;
        self.next_id += count;
        Entity(first)
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
