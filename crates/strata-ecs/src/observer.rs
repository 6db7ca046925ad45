//! Lifecycle hooks.
//!
//! A [`WorldObserver`] is installed when the world is built and is notified
//! of entity and component lifecycle events. Every hook receives the world
//! by shared reference:
//!
//! - `entity_added` runs after the entity is fully placed
//! - `component_added` runs after the value is stored
//! - `component_removed` and `entity_removed` run before any data is erased,
//!   so the value being removed is still readable
//!
//! Tag changes do not fire component hooks.

use std::fmt;

use crate::{component::ComponentId, entity::EntityId, world::World};

/// Receiver of world lifecycle events. All hooks default to no-ops.
pub trait WorldObserver: Send + Sync + 'static {
    fn entity_added(&self, _world: &World, _entity: EntityId) {}

    fn entity_removed(&self, _world: &World, _entity: EntityId) {}

    fn component_added(&self, _world: &World, _entity: EntityId, _component: ComponentId) {}

    fn component_removed(&self, _world: &World, _entity: EntityId, _component: ComponentId) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl WorldObserver for NoopObserver {}

type EntityHook = Box<dyn Fn(&World, EntityId) + Send + Sync>;
type ComponentHook = Box<dyn Fn(&World, EntityId, ComponentId) + Send + Sync>;

/// Observer assembled from closures.
///
/// ```ignore
/// let hooks = Hooks::new().on_component_removed(|world, entity, component| {
///     tracing::info!(%entity, %component, "component removed");
/// });
/// let world = World::builder().observer(hooks).build();
/// ```
#[derive(Default)]
pub struct Hooks {
    entity_added: Option<EntityHook>,
    entity_removed: Option<EntityHook>,
    component_added: Option<ComponentHook>,
    component_removed: Option<ComponentHook>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_entity_added(
        mut self,
        hook: impl Fn(&World, EntityId) + Send + Sync + 'static,
    ) -> Self {
        self.entity_added = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_entity_removed(
        mut self,
        hook: impl Fn(&World, EntityId) + Send + Sync + 'static,
    ) -> Self {
        self.entity_removed = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_component_added(
        mut self,
        hook: impl Fn(&World, EntityId, ComponentId) + Send + Sync + 'static,
    ) -> Self {
        self.component_added = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_component_removed(
        mut self,
        hook: impl Fn(&World, EntityId, ComponentId) + Send + Sync + 'static,
    ) -> Self {
        self.component_removed = Some(Box::new(hook));
        self
    }
}

impl WorldObserver for Hooks {
    fn entity_added(&self, world: &World, entity: EntityId) {
        if let Some(hook) = &self.entity_added {
            hook(world, entity);
        }
    }

    fn entity_removed(&self, world: &World, entity: EntityId) {
        if let Some(hook) = &self.entity_removed {
            hook(world, entity);
        }
    }

    fn component_added(&self, world: &World, entity: EntityId, component: ComponentId) {
        if let Some(hook) = &self.component_added {
            hook(world, entity, component);
        }
    }

    fn component_removed(&self, world: &World, entity: EntityId, component: ComponentId) {
        if let Some(hook) = &self.component_removed {
            hook(world, entity, component);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("entity_added", &self.entity_added.is_some())
            .field("entity_removed", &self.entity_removed.is_some())
            .field("component_added", &self.component_added.is_some())
            .field("component_removed", &self.component_removed.is_some())
            .finish()
    }
}
