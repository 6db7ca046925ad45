//! Entity identifiers, the id allocator and the entity directory.
//!
//! Ids are dense integers recycled through a LIFO free list. An id is only
//! unique among live entities: once removed, the same value can be handed
//! out again and refers to a brand new entity. Callers that retain ids across
//! removals must check liveness themselves.

use std::fmt;

use crate::{
    archetype::ArchetypeId,
    error::{EcsError, EcsResult},
};

/// Identifier of an entity in a [`World`](crate::World).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Create an entity ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues and recycles entity ids.
///
/// `recycle` does not validate liveness; the world only recycles ids it has
/// just removed from the directory.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Next never-issued id.
    next: u32,
    /// Recycled ids, reused most recent first.
    free_list: Vec<EntityId>,
}

impl EntityAllocator {
    /// Create a new entity allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: 0,
            free_list: Vec::new(),
        }
    }

    /// Create an allocator with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next: 0,
            free_list: Vec::with_capacity(capacity / 4),
        }
    }

    /// Allocate an id, reusing the most recently recycled one if any.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(id) = self.free_list.pop() {
            return id;
        }

        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Return an id to the free pool.
    pub fn recycle(&mut self, id: EntityId) {
        self.free_list.push(id);
    }

    /// Number of ids currently handed out.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.next as usize - self.free_list.len()
    }

    /// Number of ids waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Total number of distinct ids ever issued.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.next as usize
    }
}

/// Location of a live entity: its archetype and row within that archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// The archetype containing this entity.
    pub archetype: ArchetypeId,
    /// Row index within the archetype.
    pub row: usize,
}

/// Maps live entity ids to their [`EntityRecord`].
#[derive(Debug, Default)]
pub struct EntityDirectory {
    records: Vec<Option<EntityRecord>>,
    len: usize,
}

impl EntityDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    /// Insert or overwrite the record of `id`.
    pub fn insert(&mut self, id: EntityId, record: EntityRecord) {
        let index = id.index();
        if index >= self.records.len() {
            self.records.resize(index + 1, None);
        }
        if self.records[index].replace(record).is_none() {
            self.len += 1;
        }
    }

    /// Get the record of a live entity.
    pub fn get(&self, id: EntityId) -> EcsResult<EntityRecord> {
        self.records
            .get(id.index())
            .copied()
            .flatten()
            .ok_or(EcsError::EntityNotFound(id))
    }

    pub fn get_mut(&mut self, id: EntityId) -> EcsResult<&mut EntityRecord> {
        self.records
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(EcsError::EntityNotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        matches!(self.records.get(id.index()), Some(Some(_)))
    }

    /// Rewrite the row of an entity that was moved by swap-compaction.
    ///
    /// # Panics
    ///
    /// Panics if `id` has no record; every row of an archetype belongs to a
    /// live entity.
    pub(crate) fn set_row(&mut self, id: EntityId, row: usize) {
        match self.records.get_mut(id.index()) {
            Some(Some(record)) => record.row = row,
            _ => unreachable!("{id:?} was moved to row {row} without a record"),
        }
    }

    /// Remove and return the record of `id`.
    pub fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        let record = self.records.get_mut(id.index())?.take();
        if record.is_some() {
            self.len -= 1;
        }
        record
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live entities and their records.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityRecord)> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| record.map(|r| (EntityId(index as u32), r)))
    }
}
