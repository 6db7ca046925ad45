//! Entity names.
//!
//! Names are a side index over pool-allocated ids: an entity keeps its
//! numeric id whether or not it is named, and a name is released when its
//! entity is removed, so a recycled id never inherits a stale name.

use std::collections::BTreeMap;

use crate::{
    entity::EntityId,
    error::{EcsError, EcsResult},
    world::World,
};

/// Bidirectional name <-> entity index.
#[derive(Debug, Default)]
pub struct NameIndex {
    by_name: BTreeMap<String, EntityId>,
    by_entity: Vec<Option<String>>,
}

impl NameIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `entity`, replacing any previous name of that entity.
    ///
    /// Fails if another entity holds the name.
    pub fn bind(&mut self, entity: EntityId, name: &str) -> EcsResult<()> {
        if let Some(&owner) = self.by_name.get(name) {
            if owner == entity {
                return Ok(());
            }
            return Err(EcsError::NameTaken {
                name: name.to_owned(),
                owner,
            });
        }

        self.release(entity);

        let index = entity.index();
        if index >= self.by_entity.len() {
            self.by_entity.resize(index + 1, None);
        }
        self.by_name.insert(name.to_owned(), entity);
        self.by_entity[index] = Some(name.to_owned());
        Ok(())
    }

    /// Drop the name of `entity`, returning it.
    pub fn release(&mut self, entity: EntityId) -> Option<String> {
        let name = self.by_entity.get_mut(entity.index())?.take()?;
        self.by_name.remove(&name);
        Some(name)
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn name_of(&self, entity: EntityId) -> Option<&str> {
        self.by_entity.get(entity.index())?.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Named entities in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.by_name.iter().map(|(name, &id)| (name.as_str(), id))
    }
}

// ==================== Named Entity Operations ====================

impl World {
    /// Get the entity called `name`, creating an empty one if none exists.
    pub fn create_named(&mut self, name: &str) -> EntityId {
        if let Some(entity) = self.names.lookup(name) {
            return entity;
        }

        let entity = self.create_entity();
        // Fresh entity, unused name.
        let bound = self.names.bind(entity, name);
        debug_assert!(bound.is_ok());
        entity
    }

    /// Name an existing entity.
    ///
    /// Renaming replaces the previous name. Fails if the entity does not
    /// exist or the name belongs to another entity.
    pub fn set_name(&mut self, entity: EntityId, name: &str) -> EcsResult<()> {
        self.directory.get(entity)?;
        self.names.bind(entity, name)
    }

    /// Remove the name of an entity, returning it.
    pub fn clear_name(&mut self, entity: EntityId) -> Option<String> {
        self.names.release(entity)
    }

    /// Find an entity by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.names.lookup(name)
    }

    /// The name of an entity, if it has one.
    #[must_use]
    pub fn name_of(&self, entity: EntityId) -> Option<&str> {
        self.names.name_of(entity)
    }

    #[must_use]
    pub fn names(&self) -> &NameIndex {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_lookup() {
        let mut index = NameIndex::new();
        let e = EntityId::from_raw(3);

        index.bind(e, "player").unwrap();
        assert_eq!(index.lookup("player"), Some(e));
        assert_eq!(index.name_of(e), Some("player"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rename_frees_old_name() {
        let mut index = NameIndex::new();
        let e = EntityId::from_raw(0);

        index.bind(e, "old").unwrap();
        index.bind(e, "new").unwrap();

        assert_eq!(index.lookup("old"), None);
        assert_eq!(index.lookup("new"), Some(e));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_name_taken() {
        let mut index = NameIndex::new();
        let a = EntityId::from_raw(0);
        let b = EntityId::from_raw(1);

        index.bind(a, "unique").unwrap();
        let err = index.bind(b, "unique").unwrap_err();
        assert_eq!(
            err,
            EcsError::NameTaken {
                name: "unique".into(),
                owner: a
            }
        );
        assert_eq!(index.name_of(b), None);
    }

    #[test]
    fn test_create_named_is_get_or_create() {
        let mut world = World::new();

        let a = world.create_named("spawner");
        let b = world.create_named("spawner");
        assert_eq!(a, b);
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.name_of(a), Some("spawner"));
    }

    #[test]
    fn test_name_released_on_remove() {
        let mut world = World::new();

        let a = world.create_named("camera");
        world.remove_entity(a).unwrap();
        assert_eq!(world.lookup("camera"), None);

        // The id is recycled but does not inherit the name.
        let b = world.create_entity();
        assert_eq!(a, b);
        assert_eq!(world.name_of(b), None);

        let c = world.create_named("camera");
        assert_ne!(c, b);
        assert_eq!(world.lookup("camera"), Some(c));
    }

    #[test]
    fn test_set_name_requires_live_entity() {
        let mut world = World::new();
        let ghost = EntityId::from_raw(9);

        assert_eq!(
            world.set_name(ghost, "ghost"),
            Err(EcsError::EntityNotFound(ghost))
        );

        let e = world.create_entity();
        world.set_name(e, "ghost").unwrap();
        assert_eq!(world.clear_name(e).as_deref(), Some("ghost"));
        assert!(world.names().is_empty());
    }
}
