//! Error types for world operations.
//!
//! Every fallible operation validates its inputs before touching any
//! archetype or column, so an `Err` always means the world is unchanged.

use thiserror::Error;

use crate::{
    component::{ComponentId, TAG_BASE},
    entity::EntityId,
};

/// Errors returned by [`World`](crate::World) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    /// The entity id is not live in this world.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity already carries the component or tag.
    #[error("entity {entity} already owns component {component}")]
    ComponentAlreadyOwned {
        entity: EntityId,
        component: ComponentId,
    },

    /// The entity does not carry the component or tag.
    #[error("entity {entity} does not own component {component}")]
    ComponentNotOwned {
        entity: EntityId,
        component: ComponentId,
    },

    /// No storage exists for this id. Tags never have storage.
    #[error("component {0} is not registered")]
    ComponentTypeNotRegistered(ComponentId),

    /// A tag operation was given an id below the tag range.
    #[error("tag id {0} is out of range, tags start at {base}", base = TAG_BASE)]
    TagIdOutOfRange(ComponentId),

    /// A component type declared an id inside the tag range.
    #[error("component `{type_name}` uses id {component}, which is reserved for tags")]
    ComponentIdInTagRange {
        component: ComponentId,
        type_name: &'static str,
    },

    /// Two distinct types claimed the same component id.
    #[error("component id {component} is bound to `{existing}`, cannot register `{requested}`")]
    ComponentIdConflict {
        component: ComponentId,
        existing: &'static str,
        requested: &'static str,
    },

    /// A value of the wrong type was handed to a column.
    #[error("component {component} stores `{expected}`, got a different type")]
    ComponentTypeMismatch {
        component: ComponentId,
        expected: &'static str,
    },

    /// The component was registered without a builder.
    #[error("component {0} has no builder")]
    MissingBuilder(ComponentId),

    /// A builder received a configuration of the wrong type.
    #[error("builder for component {component} expects configuration `{expected}`")]
    InvalidConfiguration {
        component: ComponentId,
        expected: &'static str,
    },

    /// The name is already bound to another live entity.
    #[error("name {name:?} is already used by entity {owner}")]
    NameTaken { name: String, owner: EntityId },
}

/// Result type for world operations.
pub type EcsResult<T> = Result<T, EcsError>;
