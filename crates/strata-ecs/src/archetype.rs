//! Archetype storage - tables of entities with identical component sets.
//!
//! An archetype is identified by its Type: the sorted, deduplicated set of
//! component and tag ids its entities carry. Archetypes are created on demand
//! and live as long as the world. Column data is not stored here (see
//! [`storage`](crate::storage)); an archetype only owns its row list, whose
//! order matches every column of the archetype.

use std::{
    fmt,
    ops::{Index, IndexMut},
};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use tracing::debug;

use crate::{component::ComponentId, entity::EntityId};

/// Sorted, deduplicated set of component ids.
pub type ComponentSet = SmallVec<[ComponentId; 8]>;

/// Unique identifier for an archetype.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// The empty archetype (no components).
    pub const EMPTY: Self = Self(0);

    /// Create an archetype ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({})", self.0)
    }
}

/// Sort and deduplicate a list of ids into a canonical set.
pub(crate) fn normalize(ids: &[ComponentId]) -> ComponentSet {
    let mut set: ComponentSet = ids.iter().copied().collect();
    set.sort_unstable();
    set.dedup();
    set
}

/// A table of entities sharing one component set.
pub struct Archetype {
    id: ArchetypeId,
    /// Sorted ids. Tags sort after every data component.
    components: ComponentSet,
    /// Number of leading entries of `components` that are data components.
    data_len: usize,
    /// Entities, in row order.
    rows: Vec<EntityId>,
}

impl Archetype {
    fn new(id: ArchetypeId, components: ComponentSet) -> Self {
        let data_len = components.partition_point(|c| !c.is_tag());
        Self {
            id,
            components,
            data_len,
            rows: Vec::new(),
        }
    }

    /// Get the archetype ID.
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Component and tag ids of this archetype (sorted).
    #[must_use]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Ids of this archetype that own a column.
    #[must_use]
    pub fn data_components(&self) -> &[ComponentId] {
        &self.components[..self.data_len]
    }

    /// Tag ids of this archetype.
    #[must_use]
    pub fn tags(&self) -> &[ComponentId] {
        &self.components[self.data_len..]
    }

    /// Check if this archetype contains a component or tag.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    /// Check if this archetype contains every id in `ids`.
    #[must_use]
    pub fn contains_all(&self, ids: &[ComponentId]) -> bool {
        ids.iter().all(|&id| self.contains(id))
    }

    /// Get the entities in this archetype, in row order.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.rows
    }

    /// Get the number of entities in this archetype.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append an entity and return its row.
    pub(crate) fn push_row(&mut self, entity: EntityId) -> usize {
        let row = self.rows.len();
        self.rows.push(entity);
        row
    }

    /// Swap-remove the entity at `row`.
    ///
    /// Returns the entity that now occupies `row`, if a swap happened.
    pub(crate) fn swap_remove_row(&mut self, row: usize) -> Option<EntityId> {
        self.rows.swap_remove(row);
        self.rows.get(row).copied()
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.components)
            .field("len", &self.rows.len())
            .finish()
    }
}

/// Every archetype of a world, indexed by id and by component set.
pub struct ArchetypeTable {
    archetypes: Vec<Archetype>,
    index: HashMap<ComponentSet, ArchetypeId, FxBuildHasher>,
}

impl Default for ArchetypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchetypeTable {
    /// Create a table holding only the empty archetype.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a table with room for `capacity` archetypes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut archetypes = Vec::with_capacity(capacity.max(1));
        archetypes.push(Archetype::new(ArchetypeId::EMPTY, ComponentSet::new()));

        let mut index = HashMap::with_capacity_and_hasher(capacity.max(1), FxBuildHasher);
        index.insert(ComponentSet::new(), ArchetypeId::EMPTY);

        Self { archetypes, index }
    }

    /// Get the archetype for a component set, creating it if needed.
    ///
    /// The order of `ids` does not matter.
    pub fn get_or_create(&mut self, ids: &[ComponentId]) -> ArchetypeId {
        self.get_or_create_set(normalize(ids))
    }

    fn get_or_create_set(&mut self, set: ComponentSet) -> ArchetypeId {
        if let Some(&id) = self.index.get(&set) {
            return id;
        }

        let id = ArchetypeId::from_raw(self.archetypes.len() as u32);
        debug!(archetype = id.as_raw(), components = ?set, "created archetype");

        self.index.insert(set.clone(), id);
        self.archetypes.push(Archetype::new(id, set));
        id
    }

    /// Find the archetype for a component set without creating it.
    #[must_use]
    pub fn find(&self, ids: &[ComponentId]) -> Option<ArchetypeId> {
        self.index.get(&normalize(ids)).copied()
    }

    /// The archetype with `base`'s Type plus `ids`.
    pub fn with_components(&mut self, base: ArchetypeId, ids: &[ComponentId]) -> ArchetypeId {
        let base_arch = &self.archetypes[base.index()];
        if base_arch.contains_all(ids) {
            return base;
        }

        let mut set: ComponentSet = base_arch.components.clone();
        set.extend_from_slice(ids);
        set.sort_unstable();
        set.dedup();
        self.get_or_create_set(set)
    }

    /// The archetype with `base`'s Type minus `id`.
    pub fn without_component(&mut self, base: ArchetypeId, id: ComponentId) -> ArchetypeId {
        let base_arch = &self.archetypes[base.index()];
        if !base_arch.contains(id) {
            return base;
        }

        let set: ComponentSet = base_arch
            .components
            .iter()
            .copied()
            .filter(|&c| c != id)
            .collect();
        self.get_or_create_set(set)
    }

    /// Every archetype whose Type is a superset of `required`.
    pub fn filter_by_superset<'a, 'r>(
        &'a self,
        required: &'r [ComponentId],
    ) -> impl Iterator<Item = &'a Archetype> + use<'a, 'r> {
        self.archetypes
            .iter()
            .filter(move |arch| arch.contains_all(required))
    }

    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id.index())
    }

    /// Number of archetypes, including the empty one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Always `false`: the empty archetype exists from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }
}

impl Index<ArchetypeId> for ArchetypeTable {
    type Output = Archetype;

    fn index(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }
}

impl IndexMut<ArchetypeId> for ArchetypeTable {
    fn index_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }
}

impl fmt::Debug for ArchetypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeTable")
            .field("archetype_count", &self.archetypes.len())
            .finish()
    }
}
