//! Bundles: groups of components attached in a single migration.
//!
//! Any [`Component`] is a bundle of one; tuples of up to twelve components
//! are bundles of several.
//!
//! ```ignore
//! let e = world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 0.0 }))?;
//! world.add_components(e, (Health(100), Armor(3)))?;
//! ```

use std::any::{TypeId, type_name};

use smallvec::SmallVec;

use crate::{
    archetype::ArchetypeId,
    component::Component,
    component::ComponentId,
    storage::{ComponentColumn, ErasedColumn},
};

/// One component of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleComponent {
    pub id: ComponentId,
    pub type_id: TypeId,
}

impl BundleComponent {
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            id: T::ID,
            type_id: TypeId::of::<T>(),
        }
    }
}

/// The components of a bundle, in declaration order.
pub type BundleLayout = SmallVec<[BundleComponent; 8]>;

/// A set of components that can be attached together.
pub trait Bundle: Send + Sync + Sized + 'static {
    /// Append this bundle's components to `layout`.
    fn layout(layout: &mut BundleLayout);

    /// Move every value into its column.
    fn write(self, writer: &mut BundleWriter<'_>);
}

/// Appends bundle values to the columns of one archetype row.
pub struct BundleWriter<'a> {
    columns: &'a mut [Option<Box<dyn ErasedColumn>>],
    archetype: ArchetypeId,
    row: usize,
}

impl<'a> BundleWriter<'a> {
    pub(crate) fn new(
        columns: &'a mut [Option<Box<dyn ErasedColumn>>],
        archetype: ArchetypeId,
        row: usize,
    ) -> Self {
        Self {
            columns,
            archetype,
            row,
        }
    }

    /// Append `value` at the writer's row.
    ///
    /// # Panics
    ///
    /// Panics if `T` has no column or the column is out of step with the
    /// archetype's rows. The world validates bundles before writing.
    pub fn push<T: Component>(&mut self, value: T) {
        let column = self
            .columns
            .get_mut(T::ID.index())
            .and_then(Option::as_mut)
            .and_then(|column| column.as_any_mut().downcast_mut::<ComponentColumn<T>>());
        let Some(column) = column else {
            panic!("no column for {}", type_name::<T>());
        };

        let row = column.append(self.archetype, value);
        assert_eq!(
            row,
            self.row,
            "column {} out of step with {:?}",
            type_name::<T>(),
            self.archetype
        );
    }
}

impl<C: Component> Bundle for C {
    fn layout(layout: &mut BundleLayout) {
        layout.push(BundleComponent::of::<C>());
    }

    fn write(self, writer: &mut BundleWriter<'_>) {
        writer.push(self);
    }
}

macro_rules! impl_bundle_tuple {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            fn layout(layout: &mut BundleLayout) {
                $(layout.push(BundleComponent::of::<$name>());)+
            }

            #[allow(non_snake_case)]
            fn write(self, writer: &mut BundleWriter<'_>) {
                let ($($name,)+) = self;
                $(writer.push($name);)+
            }
        }
    };
}

impl_bundle_tuple!(A);
impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {
        const ID: ComponentId = ComponentId::from_raw(1);
    }

    struct Velocity;
    impl Component for Velocity {
        const ID: ComponentId = ComponentId::from_raw(2);
    }

    fn layout_of<B: Bundle>() -> Vec<ComponentId> {
        let mut layout = BundleLayout::new();
        B::layout(&mut layout);
        layout.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_single_component_layout() {
        assert_eq!(layout_of::<Position>(), vec![Position::ID]);
        assert_eq!(layout_of::<(Position,)>(), vec![Position::ID]);
    }

    #[test]
    fn test_tuple_layout_keeps_order() {
        assert_eq!(
            layout_of::<(Velocity, Position)>(),
            vec![Velocity::ID, Position::ID]
        );
    }

    #[test]
    fn test_writer_appends_to_row() {
        let mut columns: Vec<Option<Box<dyn ErasedColumn>>> = vec![
            None,
            Some(Box::new(ComponentColumn::<Position>::new())),
            Some(Box::new(ComponentColumn::<Velocity>::new())),
        ];
        let archetype = ArchetypeId::from_raw(1);

        (Position, Velocity).write(&mut BundleWriter::new(&mut columns, archetype, 0));

        for column in columns.iter().flatten() {
            assert_eq!(column.row_count(archetype), 1);
        }
    }

    #[test]
    #[should_panic(expected = "no column")]
    fn test_writer_panics_without_column() {
        let mut columns: Vec<Option<Box<dyn ErasedColumn>>> = vec![None];
        Position.write(&mut BundleWriter::new(&mut columns, ArchetypeId::EMPTY, 0));
    }
}
