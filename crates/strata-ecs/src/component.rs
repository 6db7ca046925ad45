//! Component identifiers, the `Component` trait and the type registry.
//!
//! Every component type carries a static [`ComponentId`] below [`TAG_BASE`].
//! Ids at or above [`TAG_BASE`] are tags: presence-only markers that are part
//! of an archetype's signature but never own a column.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    marker::PhantomData,
};

use crate::error::{EcsError, EcsResult};

/// First id of the tag range. Ids below this are storage-backed components.
pub const TAG_BASE: u32 = 2048;

/// Identifier of a component type or a tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

/// A [`ComponentId`] in the tag range.
pub type TagId = ComponentId;

impl ComponentId {
    /// Create a component ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Create the id of the `n`th tag.
    #[must_use]
    pub const fn tag(n: u32) -> Self {
        Self(TAG_BASE + n)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Whether this id lies in the tag range.
    #[must_use]
    pub const fn is_tag(self) -> bool {
        self.0 >= TAG_BASE
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tag() {
            write!(f, "TagId({})", self.0)
        } else {
            write!(f, "ComponentId({})", self.0)
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type that can be stored in component columns.
///
/// The id is fixed at compile time, usually through
/// `#[derive(Component)] #[component(id = N)]`.
///
/// ```ignore
/// #[derive(Component)]
/// #[component(id = 1)]
/// struct Position { x: f32, y: f32 }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Static id of this component type. Must be below [`TAG_BASE`].
    const ID: ComponentId;
}

/// Type-erased value returned by a builder.
pub type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Type-erased builder: turns a configuration value into a component value.
pub type ErasedBuilder = Box<dyn Fn(&dyn Any) -> EcsResult<BoxedComponent> + Send + Sync>;

/// Per-type registration options.
///
/// A builder lets callers attach a component by id from an arbitrary
/// configuration value, see [`World::add_configured`](crate::World::add_configured).
pub struct ComponentConfig<T: Component> {
    builder: Option<Box<dyn Fn(&dyn Any) -> EcsResult<T> + Send + Sync>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Default for ComponentConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentConfig<T> {
    /// Configuration without a builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: None,
            _marker: PhantomData,
        }
    }

    /// Install an infallible builder taking a configuration of type `C`.
    #[must_use]
    pub fn with_builder<C, F>(self, build: F) -> Self
    where
        C: 'static,
        F: Fn(&C) -> T + Send + Sync + 'static,
    {
        self.with_fallible_builder(move |conf: &C| Ok(build(conf)))
    }

    /// Install a builder that may reject the configuration.
    #[must_use]
    pub fn with_fallible_builder<C, F>(mut self, build: F) -> Self
    where
        C: 'static,
        F: Fn(&C) -> EcsResult<T> + Send + Sync + 'static,
    {
        self.builder = Some(Box::new(move |conf: &dyn Any| {
            let conf = conf
                .downcast_ref::<C>()
                .ok_or(EcsError::InvalidConfiguration {
                    component: T::ID,
                    expected: type_name::<C>(),
                })?;
            build(conf)
        }));
        self
    }

    /// Whether a builder is installed.
    #[must_use]
    pub fn has_builder(&self) -> bool {
        self.builder.is_some()
    }

    pub(crate) fn into_erased(self) -> Option<ErasedBuilder> {
        let build = self.builder?;
        Some(Box::new(move |conf: &dyn Any| {
            build(conf).map(|value| Box::new(value) as BoxedComponent)
        }))
    }
}

impl<T: Component> fmt::Debug for ComponentConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentConfig")
            .field("component", &type_name::<T>())
            .field("has_builder", &self.has_builder())
            .finish()
    }
}

/// Metadata about a registered component type.
pub struct ComponentInfo {
    id: ComponentId,
    name: &'static str,
    type_id: TypeId,
    builder: Option<ErasedBuilder>,
}

impl ComponentInfo {
    /// Create component info for type T.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            id: T::ID,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            builder: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub fn has_builder(&self) -> bool {
        self.builder.is_some()
    }

    /// Run the builder against a configuration value.
    pub fn build(&self, conf: &dyn Any) -> EcsResult<BoxedComponent> {
        let builder = self
            .builder
            .as_ref()
            .ok_or(EcsError::MissingBuilder(self.id))?;
        builder(conf)
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_builder", &self.has_builder())
            .finish()
    }
}

/// Registry of component types, indexed by their static id.
#[derive(Default)]
pub struct ComponentRegistry {
    infos: Vec<Option<ComponentInfo>>,
    count: usize,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register type T.
    ///
    /// Returns `Ok(true)` when the type was newly registered and `Ok(false)`
    /// when it already was. Fails if the id is in the tag range or belongs
    /// to another type.
    pub fn register<T: Component>(&mut self) -> EcsResult<bool> {
        let id = T::ID;
        if id.is_tag() {
            return Err(EcsError::ComponentIdInTagRange {
                component: id,
                type_name: type_name::<T>(),
            });
        }

        if let Some(existing) = self.get(id) {
            if existing.type_id == TypeId::of::<T>() {
                return Ok(false);
            }
            return Err(EcsError::ComponentIdConflict {
                component: id,
                existing: existing.name,
                requested: type_name::<T>(),
            });
        }

        if id.index() >= self.infos.len() {
            self.infos.resize_with(id.index() + 1, || None);
        }
        self.infos[id.index()] = Some(ComponentInfo::of::<T>());
        self.count += 1;
        Ok(true)
    }

    /// Replace the builder of a registered component.
    pub(crate) fn set_builder(&mut self, id: ComponentId, builder: ErasedBuilder) -> EcsResult<()> {
        let info = self
            .infos
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(EcsError::ComponentTypeNotRegistered(id))?;
        info.builder = Some(builder);
        Ok(())
    }

    /// Get the info for a component id.
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())?.as_ref()
    }

    /// Like [`get`](Self::get) but reports unregistered ids as an error.
    pub fn info(&self, id: ComponentId) -> EcsResult<&ComponentInfo> {
        self.get(id).ok_or(EcsError::ComponentTypeNotRegistered(id))
    }

    #[must_use]
    pub fn is_registered(&self, id: ComponentId) -> bool {
        self.get(id).is_some()
    }

    /// Check that `id` is registered to the Rust type `type_id`.
    pub(crate) fn check_type(&self, id: ComponentId, type_id: TypeId) -> EcsResult<()> {
        let info = self.info(id)?;
        if info.type_id == type_id {
            Ok(())
        } else {
            Err(EcsError::ComponentTypeMismatch {
                component: id,
                expected: info.name,
            })
        }
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate over registered component infos in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter().filter_map(Option::as_ref)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("count", &self.count)
            .finish()
    }
}
