//! Component columns.
//!
//! A [`ComponentColumn<T>`] holds every value of one component type, split
//! into one dense `Vec<T>` per archetype that contains the type. Row `i` of
//! an archetype's vector belongs to the entity at row `i` of that archetype.
//!
//! [`ErasedColumn`] is the object-safe view the world uses to move rows
//! without knowing `T`.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    ptr::NonNull,
};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::{
    archetype::ArchetypeId,
    component::{BoxedComponent, Component, ComponentId},
};

/// All values of component type `T`, grouped by archetype.
pub struct ComponentColumn<T> {
    tables: HashMap<ArchetypeId, Vec<T>, FxBuildHasher>,
}

impl<T: Component> Default for ComponentColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentColumn<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: HashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Append a value to an archetype's table and return its row.
    pub fn append(&mut self, archetype: ArchetypeId, value: T) -> usize {
        let table = self.tables.entry(archetype).or_default();
        table.push(value);
        table.len() - 1
    }

    #[must_use]
    pub fn get(&self, archetype: ArchetypeId, row: usize) -> Option<&T> {
        self.tables.get(&archetype)?.get(row)
    }

    pub fn get_mut(&mut self, archetype: ArchetypeId, row: usize) -> Option<&mut T> {
        self.tables.get_mut(&archetype)?.get_mut(row)
    }

    /// Overwrite the value at `row` in place.
    ///
    /// # Panics
    ///
    /// Panics if the row does not exist.
    pub fn write(&mut self, archetype: ArchetypeId, row: usize, value: T) {
        let Some(slot) = self.get_mut(archetype, row) else {
            panic!("{}: no row {row} in {archetype:?}", type_name::<T>());
        };
        *slot = value;
    }

    /// Remove the value at `row`, moving the last value of the table into
    /// its place.
    ///
    /// # Panics
    ///
    /// Panics if the row does not exist.
    pub fn swap_remove(&mut self, archetype: ArchetypeId, row: usize) -> T {
        let Some(table) = self.tables.get_mut(&archetype) else {
            panic!("{}: no table for {archetype:?}", type_name::<T>());
        };
        table.swap_remove(row)
    }

    /// Move the value at `row` of `from` to the end of `to`.
    ///
    /// The source table is compacted exactly like [`swap_remove`](Self::swap_remove).
    /// Returns the row of the value in `to`.
    pub fn move_row(&mut self, from: ArchetypeId, to: ArchetypeId, row: usize) -> usize {
        let value = self.swap_remove(from, row);
        self.append(to, value)
    }

    #[must_use]
    pub fn has_archetype(&self, archetype: ArchetypeId) -> bool {
        self.tables.contains_key(&archetype)
    }

    /// Number of values stored for an archetype.
    #[must_use]
    pub fn row_count(&self, archetype: ArchetypeId) -> usize {
        self.tables.get(&archetype).map_or(0, Vec::len)
    }

    /// The dense table of an archetype, empty if it has none.
    #[must_use]
    pub fn as_slice(&self, archetype: ArchetypeId) -> &[T] {
        self.tables
            .get(&archetype)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn as_mut_slice(&mut self, archetype: ArchetypeId) -> &mut [T] {
        self.tables
            .get_mut(&archetype)
            .map(Vec::as_mut_slice)
            .unwrap_or_default()
    }

    /// Archetypes that have a table in this column.
    pub fn archetypes(&self) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.tables.keys().copied()
    }

    /// Base pointer of an archetype's table, for read-only row access.
    pub(crate) fn table_ptr(&self, archetype: ArchetypeId) -> Option<ColumnPtr<T>> {
        let table = self.tables.get(&archetype)?;
        NonNull::new(table.as_ptr().cast_mut()).map(ColumnPtr)
    }

    /// Base pointer of an archetype's table, for read-write row access.
    pub(crate) fn table_ptr_mut(&mut self, archetype: ArchetypeId) -> Option<ColumnPtr<T>> {
        let table = self.tables.get_mut(&archetype)?;
        NonNull::new(table.as_mut_ptr()).map(ColumnPtr)
    }
}

impl<T> fmt::Debug for ComponentColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentColumn")
            .field("type", &type_name::<T>())
            .field("tables", &self.tables.len())
            .finish()
    }
}

/// Base pointer into one archetype table of a [`ComponentColumn`].
///
/// Query fetches hold these while the world is borrowed; rows handed out
/// through them never overlap.
pub struct ColumnPtr<T>(NonNull<T>);

impl<T> Clone for ColumnPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColumnPtr<T> {}

// SAFETY: a ColumnPtr is only dereferenced while the owning world is
// borrowed, and `T: Component` is `Send + Sync`.
unsafe impl<T: Send + Sync> Send for ColumnPtr<T> {}
unsafe impl<T: Send + Sync> Sync for ColumnPtr<T> {}

impl<T> ColumnPtr<T> {
    /// # Safety
    ///
    /// `row` must be in bounds and no mutable reference to it may be live.
    pub(crate) unsafe fn get<'w>(self, row: usize) -> &'w T {
        unsafe { &*self.0.as_ptr().add(row) }
    }

    /// # Safety
    ///
    /// `row` must be in bounds, the pointer must come from
    /// [`ComponentColumn::table_ptr_mut`] and no other reference to the row
    /// may be live.
    pub(crate) unsafe fn get_mut<'w>(self, row: usize) -> &'w mut T {
        unsafe { &mut *self.0.as_ptr().add(row) }
    }
}

/// Object-safe view of a [`ComponentColumn`].
pub trait ErasedColumn: Send + Sync {
    fn component_id(&self) -> ComponentId;

    /// Name of the stored Rust type.
    fn type_name(&self) -> &'static str;

    /// `TypeId` of the stored Rust type.
    fn value_type_id(&self) -> TypeId;

    /// Whether `value` has the stored type.
    fn accepts(&self, value: &dyn Any) -> bool;

    /// See [`ComponentColumn::move_row`].
    fn move_row(&mut self, from: ArchetypeId, to: ArchetypeId, row: usize) -> usize;

    /// Swap-remove a row and drop its value.
    fn swap_remove_drop(&mut self, archetype: ArchetypeId, row: usize);

    /// Swap-remove a row and return its value boxed.
    fn swap_remove_boxed(&mut self, archetype: ArchetypeId, row: usize) -> BoxedComponent;

    /// Append a boxed value.
    ///
    /// Returns the value back if it has the wrong type.
    fn push_boxed(
        &mut self,
        archetype: ArchetypeId,
        value: BoxedComponent,
    ) -> Result<usize, BoxedComponent>;

    fn get_any(&self, archetype: ArchetypeId, row: usize) -> Option<&dyn Any>;

    fn row_count(&self, archetype: ArchetypeId) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for ComponentColumn<T> {
    fn component_id(&self) -> ComponentId {
        T::ID
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn accepts(&self, value: &dyn Any) -> bool {
        value.is::<T>()
    }

    fn move_row(&mut self, from: ArchetypeId, to: ArchetypeId, row: usize) -> usize {
        Self::move_row(self, from, to, row)
    }

    fn swap_remove_drop(&mut self, archetype: ArchetypeId, row: usize) {
        drop(self.swap_remove(archetype, row));
    }

    fn swap_remove_boxed(&mut self, archetype: ArchetypeId, row: usize) -> BoxedComponent {
        Box::new(self.swap_remove(archetype, row))
    }

    fn push_boxed(
        &mut self,
        archetype: ArchetypeId,
        value: BoxedComponent,
    ) -> Result<usize, BoxedComponent> {
        let value = value.downcast::<T>()?;
        Ok(self.append(archetype, *value))
    }

    fn get_any(&self, archetype: ArchetypeId, row: usize) -> Option<&dyn Any> {
        self.get(archetype, row).map(|v| v as &dyn Any)
    }

    fn row_count(&self, archetype: ArchetypeId) -> usize {
        Self::row_count(self, archetype)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
