//! World - the main container for all ECS data.
//!
//! The World owns the id allocator, the entity directory, the archetype
//! table, one column per registered component type, the name index and the
//! lifecycle observer. Structural changes (creating and removing entities,
//! attaching and detaching components or tags) live in `migrate.rs` and
//! `tag.rs`; this module holds construction, registration and direct
//! component access.

use std::{
    any::{Any, TypeId},
    fmt,
};

use crate::{
    archetype::{Archetype, ArchetypeTable},
    component::{
        BoxedComponent, Component, ComponentConfig, ComponentId, ComponentInfo, ComponentRegistry,
    },
    config::{WorldBuilder, WorldConfig},
    entity::{EntityAllocator, EntityDirectory, EntityId, EntityRecord},
    error::{EcsError, EcsResult},
    name::NameIndex,
    observer::{NoopObserver, WorldObserver},
    storage::{ComponentColumn, ErasedColumn},
};

/// The ECS world - container for all entities and components.
pub struct World {
    /// Entity ID allocator.
    pub(crate) entities: EntityAllocator,
    /// Archetype and row of every live entity.
    pub(crate) directory: EntityDirectory,
    /// Component type registry.
    pub(crate) registry: ComponentRegistry,
    /// One column per registered component, indexed by component id.
    pub(crate) columns: Vec<Option<Box<dyn ErasedColumn>>>,
    /// Archetype storage.
    pub(crate) archetypes: ArchetypeTable,
    pub(crate) names: NameIndex,
    pub(crate) observer: Box<dyn WorldObserver>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world with default capacities and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(WorldConfig::default(), Box::new(NoopObserver))
    }

    /// Create a world with pre-allocated entity capacity.
    #[must_use]
    pub fn with_capacity(entity_capacity: usize) -> Self {
        Self::builder().entity_capacity(entity_capacity).build()
    }

    /// Start configuring a world.
    #[must_use]
    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    pub(crate) fn from_parts(config: WorldConfig, observer: Box<dyn WorldObserver>) -> Self {
        Self {
            entities: EntityAllocator::with_capacity(config.entity_capacity),
            directory: EntityDirectory::with_capacity(config.entity_capacity),
            registry: ComponentRegistry::new(),
            columns: Vec::new(),
            archetypes: ArchetypeTable::with_capacity(config.archetype_capacity),
            names: NameIndex::new(),
            observer,
        }
    }

    // ==================== Registration ====================

    /// Register component type T and create its column.
    ///
    /// Registering the same type twice is a no-op.
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentId> {
        if self.registry.register::<T>()? {
            let index = T::ID.index();
            if index >= self.columns.len() {
                self.columns.resize_with(index + 1, || None);
            }
            self.columns[index] = Some(Box::new(ComponentColumn::<T>::new()));
            tracing::debug!(
                component = T::ID.as_raw(),
                name = std::any::type_name::<T>(),
                "registered component"
            );
        }
        Ok(T::ID)
    }

    /// Register component type T with a builder configuration.
    ///
    /// A builder given here replaces one installed by an earlier call.
    pub fn register_with<T: Component>(
        &mut self,
        config: ComponentConfig<T>,
    ) -> EcsResult<ComponentId> {
        let id = self.register::<T>()?;
        if let Some(builder) = config.into_erased() {
            self.registry.set_builder(id, builder)?;
        }
        Ok(id)
    }

    #[must_use]
    pub fn is_registered(&self, id: ComponentId) -> bool {
        self.registry.is_registered(id)
    }

    #[must_use]
    pub fn component_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.registry.get(id)
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ==================== Entity Access ====================

    /// Check if an entity is alive.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.directory.contains(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.directory.len()
    }

    /// Number of archetypes, including the empty one.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Directory record of a live entity.
    pub fn record(&self, entity: EntityId) -> EcsResult<EntityRecord> {
        self.directory.get(entity)
    }

    /// The archetype an entity currently lives in.
    pub fn archetype_of(&self, entity: EntityId) -> EcsResult<&Archetype> {
        let record = self.directory.get(entity)?;
        Ok(&self.archetypes[record.archetype])
    }

    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeTable {
        &self.archetypes
    }

    #[must_use]
    pub fn allocator(&self) -> &EntityAllocator {
        &self.entities
    }

    /// Iterate over all live entities.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.directory.iter().map(|(entity, _)| entity)
    }

    // ==================== Columns ====================

    pub(crate) fn erased_column(&self, id: ComponentId) -> EcsResult<&dyn ErasedColumn> {
        self.columns
            .get(id.index())
            .and_then(Option::as_deref)
            .ok_or(EcsError::ComponentTypeNotRegistered(id))
    }

    pub(crate) fn erased_column_mut(
        &mut self,
        id: ComponentId,
    ) -> EcsResult<&mut dyn ErasedColumn> {
        match self.columns.get_mut(id.index()) {
            Some(Some(column)) => Ok(column.as_mut()),
            _ => Err(EcsError::ComponentTypeNotRegistered(id)),
        }
    }

    /// The typed column of component T.
    pub fn column<T: Component>(&self) -> EcsResult<&ComponentColumn<T>> {
        let erased = self.erased_column(T::ID)?;
        erased
            .as_any()
            .downcast_ref()
            .ok_or(EcsError::ComponentTypeMismatch {
                component: T::ID,
                expected: erased.type_name(),
            })
    }

    pub(crate) fn column_mut<T: Component>(&mut self) -> EcsResult<&mut ComponentColumn<T>> {
        let erased = self.erased_column_mut(T::ID)?;
        let expected = erased.type_name();
        erased
            .as_any_mut()
            .downcast_mut()
            .ok_or(EcsError::ComponentTypeMismatch {
                component: T::ID,
                expected,
            })
    }

    // ==================== Component Access ====================

    /// Borrow component T of an entity.
    ///
    /// The reference is tied to the world borrow; re-resolve through the
    /// entity id after any structural change.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> EcsResult<&T> {
        let record = self.directory.get(entity)?;
        let column = self.column::<T>()?;
        column
            .get(record.archetype, record.row)
            .filter(|_| self.archetypes[record.archetype].contains(T::ID))
            .ok_or(EcsError::ComponentNotOwned {
                entity,
                component: T::ID,
            })
    }

    /// Mutably borrow component T of an entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> EcsResult<&mut T> {
        let record = self.directory.get(entity)?;
        if !self.archetypes[record.archetype].contains(T::ID) {
            self.column::<T>()?;
            return Err(EcsError::ComponentNotOwned {
                entity,
                component: T::ID,
            });
        }
        self.column_mut::<T>()?
            .get_mut(record.archetype, record.row)
            .ok_or(EcsError::ComponentNotOwned {
                entity,
                component: T::ID,
            })
    }

    /// Overwrite component T of an entity in place.
    pub fn set_component<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<()> {
        *self.get_component_mut::<T>(entity)? = value;
        Ok(())
    }

    /// Check if an entity carries component T.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.has_components(entity, &[T::ID])
    }

    /// Check if an entity carries every id in `ids`. Tags count.
    #[must_use]
    pub fn has_components(&self, entity: EntityId, ids: &[ComponentId]) -> bool {
        self.directory
            .get(entity)
            .is_ok_and(|record| self.archetypes[record.archetype].contains_all(ids))
    }

    /// Borrow a component by id, without knowing its type.
    ///
    /// Tags have no storage: passing a tag id fails with
    /// [`EcsError::ComponentTypeNotRegistered`].
    pub fn get_component_dyn(&self, entity: EntityId, id: ComponentId) -> EcsResult<&dyn Any> {
        let record = self.directory.get(entity)?;
        let column = self.erased_column(id)?;
        if !self.archetypes[record.archetype].contains(id) {
            return Err(EcsError::ComponentNotOwned {
                entity,
                component: id,
            });
        }
        column
            .get_any(record.archetype, record.row)
            .ok_or(EcsError::ComponentNotOwned {
                entity,
                component: id,
            })
    }

    // ==================== Builders ====================

    /// Build a value of T from a configuration through its registered builder.
    pub fn configure<T: Component>(&self, conf: &dyn Any) -> EcsResult<T> {
        let info = self.registry.info(T::ID)?;
        self.registry.check_type(T::ID, TypeId::of::<T>())?;
        let value = info.build(conf)?;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| EcsError::ComponentTypeMismatch {
                component: T::ID,
                expected: info.name(),
            })
    }

    /// Build a component by id from a configuration and attach it.
    pub fn add_configured(
        &mut self,
        entity: EntityId,
        id: ComponentId,
        conf: &dyn Any,
    ) -> EcsResult<()> {
        self.add_configured_many(entity, &[(id, conf)])
    }

    /// Build several components by id from their configurations and attach
    /// them in one migration.
    ///
    /// Ownership is checked before any builder runs, and a failing build
    /// leaves the entity unchanged.
    pub fn add_configured_many(
        &mut self,
        entity: EntityId,
        confs: &[(ComponentId, &dyn Any)],
    ) -> EcsResult<()> {
        let record = self.directory.get(entity)?;
        let current = &self.archetypes[record.archetype];
        for (i, &(id, _)) in confs.iter().enumerate() {
            if current.contains(id) || confs[..i].iter().any(|&(seen, _)| seen == id) {
                return Err(EcsError::ComponentAlreadyOwned {
                    entity,
                    component: id,
                });
            }
        }

        let values = confs
            .iter()
            .map(|&(id, conf)| {
                let value: BoxedComponent = self.registry.info(id)?.build(conf)?;
                Ok((id, value))
            })
            .collect::<EcsResult<Vec<_>>>()?;
        self.add_components_dyn(entity, values)
    }

    // ==================== Diagnostics ====================

    /// Check every bookkeeping invariant of the world.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violation found.
    pub fn assert_consistent(&self) {
        let mut placed = 0;
        for archetype in self.archetypes.iter() {
            placed += archetype.len();
            for (row, &entity) in archetype.entities().iter().enumerate() {
                let record = self.directory.get(entity).unwrap_or_else(|_| {
                    panic!("{entity:?} in {:?} has no record", archetype.id())
                });
                assert_eq!(
                    record,
                    EntityRecord {
                        archetype: archetype.id(),
                        row
                    },
                    "record of {entity:?} does not point at its row"
                );
            }
            for &id in archetype.data_components() {
                let rows = self
                    .erased_column(id)
                    .map_or(0, |column| column.row_count(archetype.id()));
                assert_eq!(
                    rows,
                    archetype.len(),
                    "column {id} has {rows} rows in {:?}, archetype has {}",
                    archetype.id(),
                    archetype.len()
                );
            }
        }
        assert_eq!(placed, self.directory.len(), "directory and archetypes disagree");
        assert_eq!(
            self.entities.live_count(),
            self.directory.len(),
            "allocator and directory disagree"
        );
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entity_count())
            .field("archetype_count", &self.archetype_count())
            .field("component_count", &self.registry.len())
            .finish_non_exhaustive()
    }
}
