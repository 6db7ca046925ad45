//! Tags: zero-storage markers.
//!
//! A tag id (any id at or above [`TAG_BASE`](crate::TAG_BASE)) is part of an
//! archetype's Type, so it partitions entities and filters queries, but owns
//! no column. Tag changes migrate the entity like component changes do and
//! fire no hooks.

use crate::{
    component::TagId,
    entity::EntityId,
    error::{EcsError, EcsResult},
    world::World,
};

fn check_range(tag: TagId) -> EcsResult<()> {
    if tag.is_tag() {
        Ok(())
    } else {
        Err(EcsError::TagIdOutOfRange(tag))
    }
}

impl World {
    /// Mark an entity with a tag.
    pub fn add_tag(&mut self, tag: TagId, entity: EntityId) -> EcsResult<()> {
        check_range(tag)?;
        let record = self.directory.get(entity)?;
        if self.archetypes[record.archetype].contains(tag) {
            return Err(EcsError::ComponentAlreadyOwned {
                entity,
                component: tag,
            });
        }

        let target = self.archetypes.with_components(record.archetype, &[tag]);
        self.relocate(entity, record, target);
        Ok(())
    }

    /// Clear a tag from an entity.
    pub fn remove_tag(&mut self, tag: TagId, entity: EntityId) -> EcsResult<()> {
        check_range(tag)?;
        let record = self.directory.get(entity)?;
        self.check_owned(entity, record, tag)?;

        let target = self.archetypes.without_component(record.archetype, tag);
        self.relocate(entity, record, target);
        Ok(())
    }

    /// Check if an entity carries a tag. `false` for missing entities.
    #[must_use]
    pub fn has_tag(&self, tag: TagId, entity: EntityId) -> bool {
        tag.is_tag() && self.has_components(entity, &[tag])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Component,
        component::{ComponentId, TAG_BASE},
    };

    #[derive(Component, Debug, Clone, Copy, PartialEq)]
    #[component(id = 1)]
    struct Position(f32, f32);

    const ENEMY: TagId = ComponentId::tag(0);
    const FROZEN: TagId = ComponentId::tag(1);

    #[test]
    fn test_add_and_remove_tag() {
        let mut world = World::new();
        world.register::<Position>().unwrap();
        let e = world.spawn(Position(1.0, 2.0)).unwrap();

        world.add_tag(ENEMY, e).unwrap();
        assert!(world.has_tag(ENEMY, e));
        assert!(!world.has_tag(FROZEN, e));
        assert_eq!(world.get_component::<Position>(e), Ok(&Position(1.0, 2.0)));

        world.remove_tag(ENEMY, e).unwrap();
        assert!(!world.has_tag(ENEMY, e));
        assert_eq!(world.get_component::<Position>(e), Ok(&Position(1.0, 2.0)));
        world.assert_consistent();
    }

    #[test]
    fn test_tag_range_checked() {
        let mut world = World::new();
        let e = world.create_entity();
        let not_a_tag = ComponentId::from_raw(TAG_BASE - 1);

        assert_eq!(
            world.add_tag(not_a_tag, e),
            Err(EcsError::TagIdOutOfRange(not_a_tag))
        );
        assert_eq!(
            world.remove_tag(not_a_tag, e),
            Err(EcsError::TagIdOutOfRange(not_a_tag))
        );
        assert!(!world.has_tag(not_a_tag, e));
    }

    #[test]
    fn test_tag_duplicate_and_missing() {
        let mut world = World::new();
        let e = world.create_entity();

        world.add_tag(ENEMY, e).unwrap();
        assert_eq!(
            world.add_tag(ENEMY, e),
            Err(EcsError::ComponentAlreadyOwned {
                entity: e,
                component: ENEMY
            })
        );
        assert_eq!(
            world.remove_tag(FROZEN, e),
            Err(EcsError::ComponentNotOwned {
                entity: e,
                component: FROZEN
            })
        );

        let ghost = EntityId::from_raw(10);
        assert_eq!(world.add_tag(ENEMY, ghost), Err(EcsError::EntityNotFound(ghost)));
    }

    #[test]
    fn test_tags_split_archetypes() {
        let mut world = World::new();
        world.register::<Position>().unwrap();
        let plain = world.spawn(Position(0.0, 0.0)).unwrap();
        let tagged = world.spawn(Position(1.0, 1.0)).unwrap();
        world.add_tag(ENEMY, tagged).unwrap();

        let plain_arch = world.archetype_of(plain).unwrap();
        let tagged_arch = world.archetype_of(tagged).unwrap();
        assert_ne!(plain_arch.id(), tagged_arch.id());
        assert_eq!(tagged_arch.data_components(), plain_arch.data_components());
        assert_eq!(tagged_arch.tags(), &[ENEMY]);
    }

    #[test]
    fn test_tags_are_invisible_to_reads() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_tag(FROZEN, e).unwrap();

        assert_eq!(
            world.get_component_dyn(e, FROZEN).err(),
            Some(EcsError::ComponentTypeNotRegistered(FROZEN))
        );
        assert!(world.has_components(e, &[FROZEN]));
    }
}
