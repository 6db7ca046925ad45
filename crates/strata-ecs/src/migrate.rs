//! Structural changes: moving entities between archetypes.
//!
//! Adding or removing components changes an entity's archetype. The entity's
//! row is carried over column by column and the source archetype is
//! compacted by swap-remove, so every archetype stays dense.
//!
//! Every operation here checks all of its preconditions before the first
//! column is touched. A returned error means nothing changed.

use tracing::trace;

use crate::{
    archetype::{Archetype, ArchetypeId, ComponentSet},
    bundle::{Bundle, BundleLayout, BundleWriter},
    component::{BoxedComponent, Component, ComponentId},
    entity::{EntityId, EntityRecord},
    error::{EcsError, EcsResult},
    storage::ErasedColumn,
    world::World,
};

impl World {
    // ==================== Entity Operations ====================

    /// Create an entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.entities.allocate();
        let row = self.archetypes[ArchetypeId::EMPTY].push_row(entity);
        self.directory.insert(
            entity,
            EntityRecord {
                archetype: ArchetypeId::EMPTY,
                row,
            },
        );
        self.observer.entity_added(self, entity);
        entity
    }

    /// Create an entity carrying every component of `bundle`.
    ///
    /// The entity is placed directly in its final archetype.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EcsResult<EntityId> {
        let entity = self.entities.allocate();
        let ids = match self.check_bundle::<B>(entity, &self.archetypes[ArchetypeId::EMPTY]) {
            Ok(ids) => ids,
            Err(err) => {
                self.entities.recycle(entity);
                return Err(err);
            }
        };

        let target = self.archetypes.get_or_create(&ids);
        let row = self.archetypes[target].push_row(entity);
        bundle.write(&mut BundleWriter::new(&mut self.columns, target, row));
        self.directory.insert(
            entity,
            EntityRecord {
                archetype: target,
                row,
            },
        );
        trace!(%entity, archetype = target.as_raw(), "spawned entity");

        self.observer.entity_added(self, entity);
        for &id in &ids {
            self.observer.component_added(self, entity, id);
        }
        Ok(entity)
    }

    /// Remove an entity and drop all of its component values.
    ///
    /// The removal hook runs first, while the entity is still readable. The
    /// id is recycled and may be returned by a later `create_entity`.
    pub fn remove_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        let record = self.directory.get(entity)?;
        self.observer.entity_removed(self, entity);

        let EntityRecord { archetype, row } = record;
        let data = ComponentSet::from_slice(self.archetypes[archetype].data_components());
        for id in data {
            self.expect_column(id).swap_remove_drop(archetype, row);
        }

        if let Some(moved) = self.archetypes[archetype].swap_remove_row(row) {
            self.directory.set_row(moved, row);
        }
        self.directory.remove(entity);
        self.names.release(entity);
        self.entities.recycle(entity);
        trace!(%entity, archetype = archetype.as_raw(), "removed entity");
        Ok(())
    }

    // ==================== Component Operations ====================

    /// Attach component T to an entity.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<()> {
        self.add_components(entity, value)
    }

    /// Attach every component of `bundle` in one migration.
    ///
    /// Fails without changing anything if the entity already owns any of
    /// them or the bundle names a component twice.
    pub fn add_components<B: Bundle>(&mut self, entity: EntityId, bundle: B) -> EcsResult<()> {
        let record = self.directory.get(entity)?;
        let ids = self.check_bundle::<B>(entity, &self.archetypes[record.archetype])?;

        let target = self.archetypes.with_components(record.archetype, &ids);
        let row = self.relocate(entity, record, target);
        bundle.write(&mut BundleWriter::new(&mut self.columns, target, row));

        for &id in &ids {
            self.observer.component_added(self, entity, id);
        }
        Ok(())
    }

    /// Detach component T from an entity and return its value.
    ///
    /// The removal hook runs before the value leaves its column.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> EcsResult<T> {
        let record = self.directory.get(entity)?;
        self.column::<T>()?;
        self.check_owned(entity, record, T::ID)?;

        self.observer.component_removed(self, entity, T::ID);

        let target = self.archetypes.without_component(record.archetype, T::ID);
        let value = self
            .column_mut::<T>()?
            .swap_remove(record.archetype, record.row);
        self.relocate(entity, record, target);
        Ok(value)
    }

    /// Attach a boxed component by id.
    ///
    /// The value's type must match the type registered under `id`. Tags
    /// have no storage and are rejected; use [`World::add_tag`].
    pub fn add_component_dyn(
        &mut self,
        entity: EntityId,
        id: ComponentId,
        value: BoxedComponent,
    ) -> EcsResult<()> {
        let record = self.directory.get(entity)?;
        let column = self.erased_column(id)?;
        if !column.accepts(&*value) {
            return Err(EcsError::ComponentTypeMismatch {
                component: id,
                expected: column.type_name(),
            });
        }
        if self.archetypes[record.archetype].contains(id) {
            return Err(EcsError::ComponentAlreadyOwned {
                entity,
                component: id,
            });
        }

        let target = self.archetypes.with_components(record.archetype, &[id]);
        let row = self.relocate(entity, record, target);
        let pushed = self.expect_column(id).push_boxed(target, value);
        assert_eq!(
            pushed.ok(),
            Some(row),
            "column {id} out of step with {target:?}"
        );

        self.observer.component_added(self, entity, id);
        Ok(())
    }

    /// Attach several boxed components by id in one migration.
    ///
    /// Every value is checked against its registered type before anything
    /// moves. Fails without changing anything if an id repeats or is
    /// already owned.
    pub fn add_components_dyn(
        &mut self,
        entity: EntityId,
        values: Vec<(ComponentId, BoxedComponent)>,
    ) -> EcsResult<()> {
        let record = self.directory.get(entity)?;
        let current = &self.archetypes[record.archetype];

        let mut ids = ComponentSet::with_capacity(values.len());
        for (id, value) in &values {
            let column = self.erased_column(*id)?;
            if !column.accepts(&**value) {
                return Err(EcsError::ComponentTypeMismatch {
                    component: *id,
                    expected: column.type_name(),
                });
            }
            if ids.contains(id) || current.contains(*id) {
                return Err(EcsError::ComponentAlreadyOwned {
                    entity,
                    component: *id,
                });
            }
            ids.push(*id);
        }
        if ids.is_empty() {
            return Ok(());
        }

        let target = self.archetypes.with_components(record.archetype, &ids);
        let row = self.relocate(entity, record, target);
        for (id, value) in values {
            let pushed = self.expect_column(id).push_boxed(target, value);
            assert_eq!(
                pushed.ok(),
                Some(row),
                "column {id} out of step with {target:?}"
            );
        }

        for &id in &ids {
            self.observer.component_added(self, entity, id);
        }
        Ok(())
    }

    /// Detach a component by id and return its boxed value.
    pub fn remove_component_dyn(
        &mut self,
        entity: EntityId,
        id: ComponentId,
    ) -> EcsResult<BoxedComponent> {
        let record = self.directory.get(entity)?;
        self.erased_column(id)?;
        self.check_owned(entity, record, id)?;

        self.observer.component_removed(self, entity, id);

        let target = self.archetypes.without_component(record.archetype, id);
        let value = self
            .expect_column(id)
            .swap_remove_boxed(record.archetype, record.row);
        self.relocate(entity, record, target);
        Ok(value)
    }

    // ==================== Migration ====================

    /// Resolve a bundle's ids, checking that each is registered with the
    /// right type, appears once, and is not yet owned.
    fn check_bundle<B: Bundle>(
        &self,
        entity: EntityId,
        current: &Archetype,
    ) -> EcsResult<ComponentSet> {
        let mut layout = BundleLayout::new();
        B::layout(&mut layout);

        let mut ids = ComponentSet::with_capacity(layout.len());
        for component in &layout {
            self.registry
                .check_type(component.id, component.type_id)?;
            if ids.contains(&component.id) || current.contains(component.id) {
                return Err(EcsError::ComponentAlreadyOwned {
                    entity,
                    component: component.id,
                });
            }
            ids.push(component.id);
        }
        Ok(ids)
    }

    pub(crate) fn check_owned(
        &self,
        entity: EntityId,
        record: EntityRecord,
        id: ComponentId,
    ) -> EcsResult<()> {
        if self.archetypes[record.archetype].contains(id) {
            Ok(())
        } else {
            Err(EcsError::ComponentNotOwned {
                entity,
                component: id,
            })
        }
    }

    /// Move `entity` from its current archetype to `target`.
    ///
    /// Every data column shared by both archetypes carries the entity's value
    /// over. Columns present only in the source must already have had the
    /// row removed by the caller. Returns the entity's row in `target`,
    /// where any new columns must append next.
    ///
    /// # Panics
    ///
    /// Panics if a column's row count disagrees with its archetype.
    pub(crate) fn relocate(
        &mut self,
        entity: EntityId,
        record: EntityRecord,
        target: ArchetypeId,
    ) -> usize {
        let EntityRecord {
            archetype: source,
            row,
        } = record;
        debug_assert_ne!(source, target, "relocate within one archetype");

        let destination = &self.archetypes[target];
        let expected_row = destination.len();
        let shared: ComponentSet = self.archetypes[source]
            .data_components()
            .iter()
            .copied()
            .filter(|&id| destination.contains(id))
            .collect();

        for id in shared {
            let new_row = self.expect_column(id).move_row(source, target, row);
            assert_eq!(
                new_row, expected_row,
                "column {id} out of step with {target:?}"
            );
        }

        if let Some(moved) = self.archetypes[source].swap_remove_row(row) {
            self.directory.set_row(moved, row);
        }
        let new_row = self.archetypes[target].push_row(entity);
        self.directory.insert(
            entity,
            EntityRecord {
                archetype: target,
                row: new_row,
            },
        );

        trace!(
            %entity,
            from = source.as_raw(),
            to = target.as_raw(),
            row = new_row,
            "moved entity"
        );
        new_row
    }

    /// Column of a component some archetype already lists.
    fn expect_column(&mut self, id: ComponentId) -> &mut dyn ErasedColumn {
        match self.erased_column_mut(id) {
            Ok(column) => column,
            Err(_) => unreachable!("archetype lists component {id} without a column"),
        }
    }
}
