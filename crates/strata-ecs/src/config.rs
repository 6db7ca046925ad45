//! World construction options.

use std::fmt;

use crate::{
    observer::{NoopObserver, WorldObserver},
    world::World,
};

/// Preallocation sizes for a new world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
    /// Entities to reserve directory space for.
    pub entity_capacity: usize,
    /// Archetypes to reserve table space for.
    pub archetype_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 0,
            archetype_capacity: 1024,
        }
    }
}

/// Builder for a [`World`] with custom capacity and observer.
///
/// ```ignore
/// let world = World::builder()
///     .entity_capacity(10_000)
///     .observer(MyObserver::default())
///     .build();
/// ```
pub struct WorldBuilder {
    config: WorldConfig,
    observer: Box<dyn WorldObserver>,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: WorldConfig::default(),
            observer: Box::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn config(mut self, config: WorldConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn entity_capacity(mut self, capacity: usize) -> Self {
        self.config.entity_capacity = capacity;
        self
    }

    #[must_use]
    pub fn archetype_capacity(mut self, capacity: usize) -> Self {
        self.config.archetype_capacity = capacity;
        self
    }

    /// Install the lifecycle observer.
    #[must_use]
    pub fn observer(mut self, observer: impl WorldObserver) -> Self {
        self.observer = Box::new(observer);
        self
    }

    #[must_use]
    pub fn build(self) -> World {
        World::from_parts(self.config, self.observer)
    }
}

impl fmt::Debug for WorldBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
