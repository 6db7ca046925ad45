// Query fetches and typed column views hand out raw table pointers
#![allow(unsafe_code)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::float_cmp)]

//! Strata ECS - archetype-based entity storage and queries
//!
//! Entities with exactly the same set of components share an archetype, and
//! each component type stores one dense table per archetype. Queries match
//! archetypes by component set and walk their tables row by row, either
//! sequentially or in chunks spread across threads.
//!
//! # Key Concepts
//!
//! - **Entity**: a recyclable `u32` id with no data of its own
//! - **Component**: a `Send + Sync` value type with a fixed id below [`TAG_BASE`]
//! - **Tag**: an id at or above [`TAG_BASE`]; part of an archetype, owns no data
//! - **Archetype**: the sorted set of component and tag ids an entity has
//! - **Query**: a reusable description of the components and tags to visit
//!
//! # Mutation
//!
//! Adding or removing a component moves the entity to a new archetype. The
//! last row of the old archetype fills the gap it leaves, so rows stay
//! dense and every entity keeps a valid `(archetype, row)` record.
//!
//! ```ignore
//! #[derive(Component)]
//! #[component(id = 1)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut world = World::new();
//! world.register::<Position>()?;
//! let e = world.spawn(Position { x: 0.0, y: 0.0 })?;
//! world.get_component_mut::<Position>(e)?.x += 1.0;
//! ```

// Lets `#[derive(Component)]` expand inside this crate.
#[allow(unused_extern_crates)]
extern crate self as strata_ecs;

mod archetype;
mod bundle;
mod component;
mod config;
mod entity;
mod error;
mod migrate;
mod name;
mod observer;
mod query;
mod storage;
mod tag;
mod world;

pub use archetype::{Archetype, ArchetypeId, ArchetypeTable, ComponentSet};
pub use bundle::{Bundle, BundleComponent, BundleLayout, BundleWriter};
pub use component::{
    BoxedComponent, Component, ComponentConfig, ComponentId, ComponentInfo, ComponentRegistry,
    ErasedBuilder, TAG_BASE, TagId,
};
pub use config::{WorldBuilder, WorldConfig};
pub use entity::{EntityAllocator, EntityDirectory, EntityId, EntityRecord};
pub use error::{EcsError, EcsResult};
pub use name::NameIndex;
pub use observer::{Hooks, NoopObserver, WorldObserver};
pub use query::{
    Access, ChunkFilter, ChunkIter, Query, QueryChunk, QueryData, QueryIter, ReadOnlyQueryData,
    Term,
};
pub use storage::{ColumnPtr, ComponentColumn, ErasedColumn};
pub use strata_ecs_derive::Component;
pub use world::World;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Component, ComponentId, EcsError, EcsResult, EntityId, Hooks, Query, TagId, World,
        WorldObserver,
    };
}
