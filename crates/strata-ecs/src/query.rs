//! Typed queries over archetypes.
//!
//! A query is described by a tuple of terms:
//!
//! - `&T` - read component T; required
//! - `&mut T` - write component T; required
//! - `Option<&T>` / `Option<&mut T>` - read or write T when present; never
//!   excludes an archetype
//!
//! plus any number of required tags. Matching archetypes are recomputed on
//! every use, so a query built once keeps seeing archetypes created later.
//!
//! ```ignore
//! let query = world.query::<(&mut Position, &Velocity)>().with_tag(MOVING);
//! query.for_each(&mut world, |_, (pos, vel)| {
//!     pos.x += vel.x;
//!     pos.y += vel.y;
//! });
//! ```
//!
//! # Chunked iteration
//!
//! [`Query::chunks`] and [`Query::chunks_mut`] split every matched archetype
//! into contiguous row ranges of at most `chunk_size` rows and deliver them
//! through a channel. Chunks never overlap, so each can be processed on its
//! own thread. All chunks are enqueued before the receiver is returned and
//! the sender is dropped after the last one; consumers may stop early by
//! dropping the receiver.

use std::{any::TypeId, fmt, iter::FusedIterator, marker::PhantomData};

use crossbeam_channel::{Receiver, unbounded};
use rayon::iter::{ParallelBridge, ParallelIterator};

use crate::{
    archetype::{Archetype, ArchetypeId, ComponentSet, normalize},
    component::{Component, ComponentId, TagId},
    entity::EntityId,
    storage::ColumnPtr,
    world::World,
};

// =============================================================================
// Terms
// =============================================================================

/// How a term accesses its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// One component accessed by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    pub id: ComponentId,
    /// Rust type the term fetches; must be the type registered under `id`.
    pub type_id: TypeId,
    pub access: Access,
    /// Optional terms never exclude an archetype.
    pub optional: bool,
}

/// Types that can be fetched per row by a query.
///
/// # Safety
///
/// `terms` must list every component `fetch` touches with the access it
/// performs, and `fetch` must only create references into the given row.
pub unsafe trait QueryData {
    /// What one row yields.
    type Item<'w>;
    /// Per-archetype state: base pointers into the archetype's tables.
    type Fetch: Copy + Send + Sync;

    fn terms(terms: &mut Vec<Term>);

    /// Prepare fetching from `archetype`. `None` skips the archetype.
    fn init_fetch_mut(world: &mut World, archetype: ArchetypeId) -> Option<Self::Fetch>;

    /// # Safety
    ///
    /// `fetch` must come from an init call for an archetype whose world is
    /// borrowed for `'w`, `row` must be in bounds, and no other live item
    /// may alias this row's mutable terms.
    unsafe fn fetch<'w>(fetch: Self::Fetch, row: usize) -> Self::Item<'w>;
}

/// Query data that only reads, and can therefore run on a shared world.
///
/// # Safety
///
/// Implementors must not write through the fetch.
pub unsafe trait ReadOnlyQueryData: QueryData {
    fn init_fetch(world: &World, archetype: ArchetypeId) -> Option<Self::Fetch>;
}

unsafe impl<T: Component> QueryData for &T {
    type Item<'w> = &'w T;
    type Fetch = ColumnPtr<T>;

    fn terms(terms: &mut Vec<Term>) {
        terms.push(Term {
            id: T::ID,
            type_id: TypeId::of::<T>(),
            access: Access::Read,
            optional: false,
        });
    }

    fn init_fetch_mut(world: &mut World, archetype: ArchetypeId) -> Option<Self::Fetch> {
        world.column_mut::<T>().ok()?.table_ptr_mut(archetype)
    }

    unsafe fn fetch<'w>(fetch: Self::Fetch, row: usize) -> Self::Item<'w> {
        unsafe { fetch.get(row) }
    }
}

unsafe impl<T: Component> ReadOnlyQueryData for &T {
    fn init_fetch(world: &World, archetype: ArchetypeId) -> Option<Self::Fetch> {
        world.column::<T>().ok()?.table_ptr(archetype)
    }
}

unsafe impl<T: Component> QueryData for &mut T {
    type Item<'w> = &'w mut T;
    type Fetch = ColumnPtr<T>;

    fn terms(terms: &mut Vec<Term>) {
        terms.push(Term {
            id: T::ID,
            type_id: TypeId::of::<T>(),
            access: Access::Write,
            optional: false,
        });
    }

    fn init_fetch_mut(world: &mut World, archetype: ArchetypeId) -> Option<Self::Fetch> {
        world.column_mut::<T>().ok()?.table_ptr_mut(archetype)
    }

    unsafe fn fetch<'w>(fetch: Self::Fetch, row: usize) -> Self::Item<'w> {
        unsafe { fetch.get_mut(row) }
    }
}

unsafe impl<T: Component> QueryData for Option<&T> {
    type Item<'w> = Option<&'w T>;
    type Fetch = Option<ColumnPtr<T>>;

    fn terms(terms: &mut Vec<Term>) {
        terms.push(Term {
            id: T::ID,
            type_id: TypeId::of::<T>(),
            access: Access::Read,
            optional: true,
        });
    }

    fn init_fetch_mut(world: &mut World, archetype: ArchetypeId) -> Option<Self::Fetch> {
        Some(
            world
                .column_mut::<T>()
                .ok()
                .and_then(|column| column.table_ptr_mut(archetype)),
        )
    }

    unsafe fn fetch<'w>(fetch: Self::Fetch, row: usize) -> Self::Item<'w> {
        fetch.map(|column| unsafe { column.get(row) })
    }
}

unsafe impl<T: Component> ReadOnlyQueryData for Option<&T> {
    fn init_fetch(world: &World, archetype: ArchetypeId) -> Option<Self::Fetch> {
        Some(
            world
                .column::<T>()
                .ok()
                .and_then(|column| column.table_ptr(archetype)),
        )
    }
}

unsafe impl<T: Component> QueryData for Option<&mut T> {
    type Item<'w> = Option<&'w mut T>;
    type Fetch = Option<ColumnPtr<T>>;

    fn terms(terms: &mut Vec<Term>) {
        terms.push(Term {
            id: T::ID,
            type_id: TypeId::of::<T>(),
            access: Access::Write,
            optional: true,
        });
    }

    fn init_fetch_mut(world: &mut World, archetype: ArchetypeId) -> Option<Self::Fetch> {
        Some(
            world
                .column_mut::<T>()
                .ok()
                .and_then(|column| column.table_ptr_mut(archetype)),
        )
    }

    unsafe fn fetch<'w>(fetch: Self::Fetch, row: usize) -> Self::Item<'w> {
        fetch.map(|column| unsafe { column.get_mut(row) })
    }
}

macro_rules! impl_query_data_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        unsafe impl<$($name: QueryData),+> QueryData for ($($name,)+) {
            type Item<'w> = ($($name::Item<'w>,)+);
            type Fetch = ($($name::Fetch,)+);

            fn terms(terms: &mut Vec<Term>) {
                $($name::terms(terms);)+
            }

            fn init_fetch_mut(world: &mut World, archetype: ArchetypeId) -> Option<Self::Fetch> {
                Some(($($name::init_fetch_mut(world, archetype)?,)+))
            }

            unsafe fn fetch<'w>(fetch: Self::Fetch, row: usize) -> Self::Item<'w> {
                let ($($name,)+) = fetch;
                unsafe { ($($name::fetch($name, row),)+) }
            }
        }

        unsafe impl<$($name: ReadOnlyQueryData),+> ReadOnlyQueryData for ($($name,)+) {
            fn init_fetch(world: &World, archetype: ArchetypeId) -> Option<Self::Fetch> {
                Some(($($name::init_fetch(world, archetype)?,)+))
            }
        }
    };
}

impl_query_data_tuple!(A);
impl_query_data_tuple!(A, B);
impl_query_data_tuple!(A, B, C);
impl_query_data_tuple!(A, B, C, D);
impl_query_data_tuple!(A, B, C, D, E);
impl_query_data_tuple!(A, B, C, D, E, F);
impl_query_data_tuple!(A, B, C, D, E, F, G);
impl_query_data_tuple!(A, B, C, D, E, F, G, H);

// =============================================================================
// Query
// =============================================================================

/// A reusable query descriptor.
///
/// Holds only component ids; build it once and run it against the world as
/// often as needed.
pub struct Query<D: QueryData> {
    /// Ids every matched archetype must contain: required terms plus tags.
    filter: ComponentSet,
    required: ComponentSet,
    optional: ComponentSet,
    tags: ComponentSet,
    /// Types of the required terms, checked against the registry on use.
    types: Vec<(ComponentId, TypeId)>,
    _marker: PhantomData<fn() -> D>,
}

impl<D: QueryData> Query<D> {
    /// Build the descriptor for `D`.
    ///
    /// # Panics
    ///
    /// Panics if a component is accessed mutably by one term and by any
    /// other term of the same query.
    #[must_use]
    pub fn new() -> Self {
        let mut terms = Vec::new();
        D::terms(&mut terms);

        for (i, a) in terms.iter().enumerate() {
            for b in &terms[i + 1..] {
                assert!(
                    a.id != b.id || (a.access == Access::Read && b.access == Access::Read),
                    "query accesses component {} mutably through more than one term",
                    a.id
                );
            }
        }

        let required: Vec<ComponentId> = terms.iter().filter(|t| !t.optional).map(|t| t.id).collect();
        let optional: Vec<ComponentId> = terms.iter().filter(|t| t.optional).map(|t| t.id).collect();
        let required = normalize(&required);
        let types = terms
            .iter()
            .filter(|t| !t.optional)
            .map(|t| (t.id, t.type_id))
            .collect();

        Self {
            filter: required.clone(),
            required,
            optional: normalize(&optional),
            tags: ComponentSet::new(),
            types,
            _marker: PhantomData,
        }
    }

    /// Only match entities carrying `tag`.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is not in the tag range.
    #[must_use]
    pub fn with_tag(mut self, tag: TagId) -> Self {
        assert!(tag.is_tag(), "{tag:?} is not a tag id");
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
            self.tags.sort_unstable();
            self.filter.push(tag);
            self.filter.sort_unstable();
        }
        self
    }

    /// Only match entities carrying every tag in `tags`.
    ///
    /// # Panics
    ///
    /// Panics if any id is not in the tag range.
    #[must_use]
    pub fn with_tags(self, tags: &[TagId]) -> Self {
        tags.iter().fold(self, |query, &tag| query.with_tag(tag))
    }

    /// Required component ids, sorted.
    #[must_use]
    pub fn required(&self) -> &[ComponentId] {
        &self.required
    }

    /// Optional component ids, sorted.
    #[must_use]
    pub fn optional(&self) -> &[ComponentId] {
        &self.optional
    }

    /// Required tag ids, sorted.
    #[must_use]
    pub fn tags(&self) -> &[TagId] {
        &self.tags
    }

    /// Archetypes containing every required id, or none at all when a
    /// required id is registered to a different type than the term reads.
    fn matching<'s, 'w>(
        &'s self,
        world: &'w World,
    ) -> impl Iterator<Item = &'w Archetype> + use<'s, 'w, D> {
        let fetchable = self
            .types
            .iter()
            .all(|&(id, type_id)| world.registry.check_type(id, type_id).is_ok());
        world
            .archetypes
            .filter_by_superset(&self.filter)
            .filter(move |_| fetchable)
    }

    /// Archetypes matched by this query right now.
    #[must_use]
    pub fn resolve(&self, world: &World) -> Vec<ArchetypeId> {
        self.matching(world).map(Archetype::id).collect()
    }

    /// Number of matching entities.
    #[must_use]
    pub fn count(&self, world: &World) -> usize {
        self.matching(world).map(Archetype::len).sum()
    }

    /// Ids of all matching entities, archetype by archetype in row order.
    #[must_use]
    pub fn entity_ids(&self, world: &World) -> Vec<EntityId> {
        let mut ids = Vec::with_capacity(self.count(world));
        for archetype in self.matching(world) {
            ids.extend_from_slice(archetype.entities());
        }
        ids
    }

    /// Iterate with read and write access.
    pub fn iter_mut<'w>(&self, world: &'w mut World) -> QueryIter<'w, D> {
        QueryIter::new(self.tables_mut(world))
    }

    /// Run `f` on every matching row.
    pub fn for_each<F>(&self, world: &mut World, mut f: F)
    where
        F: FnMut(EntityId, D::Item<'_>),
    {
        for (entity, item) in self.iter_mut(world) {
            f(entity, item);
        }
    }

    /// Split the matching rows into chunks with read and write access.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn chunks_mut<'w>(
        &self,
        world: &'w mut World,
        chunk_size: usize,
    ) -> Receiver<QueryChunk<'w, D>> {
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        send_chunks(self.tables_mut(world), chunk_size, None)
    }

    /// Like [`chunks_mut`](Self::chunks_mut), with `predicate` applied to
    /// every row as the chunk is iterated.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn chunks_mut_filtered<'w>(
        &self,
        world: &'w mut World,
        chunk_size: usize,
        predicate: &'w ChunkFilter<'w, D>,
    ) -> Receiver<QueryChunk<'w, D>> {
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        send_chunks(self.tables_mut(world), chunk_size, Some(predicate))
    }

    /// Process chunks of rows on the rayon thread pool.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn par_for_each_mut<'w, F>(&self, world: &'w mut World, chunk_size: usize, f: F)
    where
        D: 'w,
        F: Fn(EntityId, D::Item<'w>) + Send + Sync,
    {
        drain_parallel(self.chunks_mut(world, chunk_size), &f);
    }

    fn tables_mut<'w>(&self, world: &'w mut World) -> Vec<ArchetypeRows<'w, D::Fetch>> {
        let archetypes: Vec<ArchetypeId> = self
            .matching(world)
            .filter(|archetype| !archetype.is_empty())
            .map(Archetype::id)
            .collect();

        let fetches: Vec<(ArchetypeId, D::Fetch)> = archetypes
            .into_iter()
            .filter_map(|id| D::init_fetch_mut(world, id).map(|fetch| (id, fetch)))
            .collect();

        let world: &'w World = world;
        fetches
            .into_iter()
            .map(|(id, fetch)| ArchetypeRows {
                archetype: id,
                fetch,
                entities: world.archetypes[id].entities(),
            })
            .collect()
    }
}

impl<D: ReadOnlyQueryData> Query<D> {
    /// Iterate with read-only access.
    pub fn iter<'w>(&self, world: &'w World) -> QueryIter<'w, D> {
        QueryIter::new(self.tables(world))
    }

    /// Iterate over the rows accepted by `predicate`.
    pub fn iter_filtered<'w, P>(
        &self,
        world: &'w World,
        mut predicate: P,
    ) -> impl Iterator<Item = (EntityId, D::Item<'w>)> + use<'w, D, P>
    where
        P: FnMut(EntityId, &D::Item<'w>) -> bool,
    {
        self.iter(world)
            .filter(move |(entity, item)| predicate(*entity, item))
    }

    /// Split the matching rows into read-only chunks.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn chunks<'w>(&self, world: &'w World, chunk_size: usize) -> Receiver<QueryChunk<'w, D>> {
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        send_chunks(self.tables(world), chunk_size, None)
    }

    /// Like [`chunks`](Self::chunks), with `predicate` applied to every row
    /// as the chunk is iterated.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn chunks_filtered<'w>(
        &self,
        world: &'w World,
        chunk_size: usize,
        predicate: &'w ChunkFilter<'w, D>,
    ) -> Receiver<QueryChunk<'w, D>> {
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        send_chunks(self.tables(world), chunk_size, Some(predicate))
    }

    /// Process read-only chunks of rows on the rayon thread pool.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn par_for_each<'w, F>(&self, world: &'w World, chunk_size: usize, f: F)
    where
        D: 'w,
        F: Fn(EntityId, D::Item<'w>) + Send + Sync,
    {
        drain_parallel(self.chunks(world, chunk_size), &f);
    }

    fn tables<'w>(&self, world: &'w World) -> Vec<ArchetypeRows<'w, D::Fetch>> {
        self.matching(world)
            .filter(|archetype| !archetype.is_empty())
            .filter_map(|archetype| {
                let fetch = D::init_fetch(world, archetype.id())?;
                Some(ArchetypeRows {
                    archetype: archetype.id(),
                    fetch,
                    entities: archetype.entities(),
                })
            })
            .collect()
    }
}

impl<D: QueryData> Default for Query<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: QueryData> Clone for Query<D> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            required: self.required.clone(),
            optional: self.optional.clone(),
            tags: self.tags.clone(),
            types: self.types.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D: QueryData> fmt::Debug for Query<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("tags", &self.tags)
            .finish()
    }
}

impl World {
    /// Build a query for `D`. See [`Query::new`].
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn query<D: QueryData>(&self) -> Query<D> {
        Query::new()
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// One matched, non-empty archetype ready for fetching.
struct ArchetypeRows<'w, F> {
    archetype: ArchetypeId,
    fetch: F,
    entities: &'w [EntityId],
}

/// Iterator over `(EntityId, item)` for every matching row.
pub struct QueryIter<'w, D: QueryData> {
    tables: Vec<ArchetypeRows<'w, D::Fetch>>,
    table: usize,
    row: usize,
    remaining: usize,
    _marker: PhantomData<fn() -> D>,
}

impl<'w, D: QueryData> QueryIter<'w, D> {
    fn new(tables: Vec<ArchetypeRows<'w, D::Fetch>>) -> Self {
        let remaining = tables.iter().map(|t| t.entities.len()).sum();
        Self {
            tables,
            table: 0,
            row: 0,
            remaining,
            _marker: PhantomData,
        }
    }
}

impl<'w, D: QueryData> Iterator for QueryIter<'w, D> {
    type Item = (EntityId, D::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let table = self.tables.get(self.table)?;
            if let Some(&entity) = table.entities.get(self.row) {
                // SAFETY: the row is in bounds, the world is borrowed for 'w
                // and each row is yielded once.
                let item = unsafe { D::fetch(table.fetch, self.row) };
                self.row += 1;
                self.remaining -= 1;
                return Some((entity, item));
            }
            self.table += 1;
            self.row = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<D: QueryData> ExactSizeIterator for QueryIter<'_, D> {}

impl<D: QueryData> FusedIterator for QueryIter<'_, D> {}

/// Row predicate applied while iterating a filtered chunk.
pub type ChunkFilter<'w, D> = dyn Fn(EntityId, &<D as QueryData>::Item<'w>) -> bool + Sync + 'w;

/// A contiguous range of rows from one archetype.
pub struct QueryChunk<'w, D: QueryData> {
    archetype: ArchetypeId,
    fetch: D::Fetch,
    /// Entities of the range; `entities[0]` sits at row `start`.
    entities: &'w [EntityId],
    start: usize,
    filter: Option<&'w ChunkFilter<'w, D>>,
    _marker: PhantomData<fn() -> D>,
}

impl<D: QueryData> QueryChunk<'_, D> {
    #[must_use]
    pub fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    /// First archetype row covered by this chunk.
    #[must_use]
    pub fn start_row(&self) -> usize {
        self.start
    }

    /// Number of rows in the chunk, before any filter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        self.entities
    }
}

impl<D: QueryData> fmt::Debug for QueryChunk<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryChunk")
            .field("archetype", &self.archetype)
            .field("start", &self.start)
            .field("len", &self.entities.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<'w, D: QueryData> IntoIterator for QueryChunk<'w, D> {
    type Item = (EntityId, D::Item<'w>);
    type IntoIter = ChunkIter<'w, D>;

    fn into_iter(self) -> Self::IntoIter {
        ChunkIter {
            chunk: self,
            index: 0,
        }
    }
}

/// Iterator over the rows of a [`QueryChunk`].
pub struct ChunkIter<'w, D: QueryData> {
    chunk: QueryChunk<'w, D>,
    index: usize,
}

impl<'w, D: QueryData> Iterator for ChunkIter<'w, D> {
    type Item = (EntityId, D::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &entity = self.chunk.entities.get(self.index)?;
            let row = self.chunk.start + self.index;
            self.index += 1;

            // SAFETY: chunks of one call never overlap and each row of a
            // chunk is yielded once.
            let item = unsafe { D::fetch(self.chunk.fetch, row) };
            match self.chunk.filter {
                Some(predicate) if !predicate(entity, &item) => {}
                _ => return Some((entity, item)),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.chunk.entities.len() - self.index;
        match self.chunk.filter {
            Some(_) => (0, Some(left)),
            None => (left, Some(left)),
        }
    }
}

impl<D: QueryData> FusedIterator for ChunkIter<'_, D> {}

fn send_chunks<'w, D: QueryData>(
    tables: Vec<ArchetypeRows<'w, D::Fetch>>,
    chunk_size: usize,
    filter: Option<&'w ChunkFilter<'w, D>>,
) -> Receiver<QueryChunk<'w, D>> {
    let (sender, receiver) = unbounded();
    for table in tables {
        for (index, entities) in table.entities.chunks(chunk_size).enumerate() {
            let chunk = QueryChunk {
                archetype: table.archetype,
                fetch: table.fetch,
                entities,
                start: index * chunk_size,
                filter,
                _marker: PhantomData,
            };
            // The receiver is still held here, so sending cannot fail.
            let _ = sender.send(chunk);
        }
    }
    drop(sender);
    receiver
}

fn drain_parallel<'w, D, F>(chunks: Receiver<QueryChunk<'w, D>>, f: &F)
where
    D: QueryData,
    F: Fn(EntityId, D::Item<'w>) + Send + Sync,
{
    chunks.into_iter().par_bridge().for_each(|chunk| {
        for (entity, item) in chunk {
            f(entity, item);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hashbrown::HashSet;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        const ID: ComponentId = ComponentId::from_raw(1);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }
    impl Component for Velocity {
        const ID: ComponentId = ComponentId::from_raw(2);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);
    impl Component for Health {
        const ID: ComponentId = ComponentId::from_raw(3);
    }

    const ENEMY: TagId = ComponentId::tag(0);

    fn world() -> World {
        let mut world = World::new();
        world.register::<Position>().unwrap();
        world.register::<Velocity>().unwrap();
        world.register::<Health>().unwrap();
        world
    }

    fn pos(x: f32) -> Position {
        Position { x, y: 0.0 }
    }

    fn vel(x: f32) -> Velocity {
        Velocity { x, y: 0.0 }
    }

    // =========================================================================
    // Matching
    // =========================================================================

    #[test]
    fn test_query_filter_and_count() {
        let mut world = world();
        let ab: Vec<EntityId> = (0..3)
            .map(|i| world.spawn((pos(i as f32), vel(1.0))).unwrap())
            .collect();
        let abc: Vec<EntityId> = (0..2)
            .map(|i| world.spawn((pos(i as f32), vel(1.0), Health(1))).unwrap())
            .collect();
        world.spawn(pos(9.0)).unwrap();

        let query = world.query::<(&Position, &Velocity)>();
        assert_eq!(query.count(&world), 5);

        let mut ids = query.entity_ids(&world);
        ids.sort();
        let mut expected: Vec<EntityId> = ab.iter().chain(&abc).copied().collect();
        expected.sort();
        assert_eq!(ids, expected);

        let with_health = world.query::<(&Position, &Velocity, &Health)>();
        assert_eq!(with_health.count(&world), 2);
        assert_eq!(with_health.iter(&world).len(), 2);
    }

    #[test]
    fn test_query_with_mismatched_type_matches_nothing() {
        /// Shares its id with `Health`, which holds the registration.
        #[allow(dead_code)]
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Shield(u32);
        impl Component for Shield {
            const ID: ComponentId = ComponentId::from_raw(3);
        }

        let mut world = world();
        for i in 0..5 {
            world.spawn((pos(i as f32), Health(i))).unwrap();
        }

        let query = world.query::<&Shield>();
        assert_eq!(query.count(&world), 0);
        assert!(query.entity_ids(&world).is_empty());
        assert!(query.resolve(&world).is_empty());
        assert_eq!(query.iter(&world).len(), 0);
        assert_eq!(query.chunks(&world, 2).into_iter().count(), 0);

        let optional = world.query::<(&Position, Option<&Shield>)>();
        assert_eq!(optional.count(&world), 5);
        assert_eq!(optional.iter(&world).len(), 5);
        assert!(optional.iter(&world).all(|(_, (_, shield))| shield.is_none()));
    }

    #[test]
    fn test_query_sees_new_archetypes() {
        let mut world = world();
        let query = world.query::<&Position>();
        assert_eq!(query.count(&world), 0);

        world.spawn(pos(1.0)).unwrap();
        world.spawn((pos(2.0), Health(1))).unwrap();
        assert_eq!(query.count(&world), 2);
        assert_eq!(query.resolve(&world).len(), 2);
    }

    #[test]
    fn test_optional_terms() {
        let mut world = world();
        let with = world.spawn((pos(1.0), vel(5.0))).unwrap();
        let without = world.spawn(pos(2.0)).unwrap();

        let query = world.query::<(&Position, Option<&Velocity>)>();
        assert_eq!(query.required(), &[Position::ID]);
        assert_eq!(query.optional(), &[Velocity::ID]);

        let rows: Vec<(EntityId, Option<Velocity>)> = query
            .iter(&world)
            .map(|(e, (_, v))| (e, v.copied()))
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&(with, Some(vel(5.0)))));
        assert!(rows.contains(&(without, None)));
    }

    #[test]
    fn test_optional_mut_writes_when_present() {
        let mut world = world();
        let with = world.spawn((pos(0.0), Health(10))).unwrap();
        let without = world.spawn(pos(0.0)).unwrap();

        world
            .query::<(&Position, Option<&mut Health>)>()
            .for_each(&mut world, |_, (_, health)| {
                if let Some(health) = health {
                    health.0 += 5;
                }
            });

        assert_eq!(world.get_component::<Health>(with), Ok(&Health(15)));
        assert!(!world.has_component::<Health>(without));
    }

    #[test]
    fn test_tags_filter_queries() {
        let mut world = world();
        let plain = world.spawn(pos(0.0)).unwrap();
        let enemy = world.spawn(pos(1.0)).unwrap();
        world.add_tag(ENEMY, enemy).unwrap();

        let all = world.query::<&Position>();
        assert_eq!(all.count(&world), 2);

        let enemies = world.query::<&Position>().with_tag(ENEMY);
        assert_eq!(enemies.tags(), &[ENEMY]);
        assert_eq!(enemies.entity_ids(&world), vec![enemy]);

        world.remove_tag(ENEMY, enemy).unwrap();
        assert_eq!(enemies.count(&world), 0);
        assert_eq!(all.count(&world), 2);
        assert!(world.contains(plain));
    }

    #[test]
    fn test_with_tags_dedups() {
        let query = Query::<&Position>::new().with_tags(&[ENEMY, ENEMY, ComponentId::tag(4)]);
        assert_eq!(query.tags(), &[ENEMY, ComponentId::tag(4)]);
    }

    #[test]
    #[should_panic(expected = "not a tag id")]
    fn test_with_tag_rejects_components() {
        let _ = Query::<&Position>::new().with_tag(Health::ID);
    }

    #[test]
    #[should_panic(expected = "mutably through more than one term")]
    fn test_aliasing_mutable_terms_panics() {
        let _ = Query::<(&mut Position, &Position)>::new();
    }

    #[test]
    fn test_shared_reads_may_repeat() {
        let query = Query::<(&Position, &Position)>::new();
        assert_eq!(query.required(), &[Position::ID]);
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    #[test]
    fn test_iter_mut_updates_values() {
        let mut world = world();
        let entities: Vec<EntityId> = (0..100)
            .map(|i| world.spawn((pos(i as f32), vel(1.0))).unwrap())
            .collect();

        for (_, (p, v)) in world.query::<(&mut Position, &Velocity)>().iter_mut(&mut world) {
            p.x += v.x;
        }

        for (i, &e) in entities.iter().enumerate() {
            assert_eq!(world.get_component::<Position>(e).unwrap().x, i as f32 + 1.0);
        }
    }

    #[test]
    fn test_iter_is_exact_size_and_stops_early() {
        let mut world = world();
        for i in 0..10 {
            world.spawn(pos(i as f32)).unwrap();
        }
        for i in 0..5 {
            world.spawn((pos(i as f32), Health(0))).unwrap();
        }

        let query = world.query::<&Position>();
        let mut iter = query.iter(&world);
        assert_eq!(iter.len(), 15);
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 13);

        assert_eq!(query.iter(&world).take(3).count(), 3);
    }

    #[test]
    fn test_iter_filtered() {
        let mut world = world();
        for hp in 0..20 {
            world.spawn((pos(0.0), Health(hp))).unwrap();
        }

        let query = world.query::<&Health>();
        let low: Vec<u32> = query
            .iter_filtered(&world, |_, health| health.0 < 5)
            .map(|(_, health)| health.0)
            .collect();
        assert_eq!(low.len(), 5);
        assert!(low.iter().all(|&hp| hp < 5));
    }

    #[test]
    fn test_iter_skips_empty_archetypes() {
        let mut world = world();
        let e = world.spawn((pos(0.0), vel(0.0))).unwrap();
        world.remove_component::<Velocity>(e).unwrap();

        let query = world.query::<(&Position, &Velocity)>();
        assert_eq!(query.resolve(&world).len(), 1);
        assert_eq!(query.iter(&world).count(), 0);
        assert_eq!(query.chunks(&world, 4).iter().count(), 0);
    }

    // =========================================================================
    // Chunks
    // =========================================================================

    fn populated(n: usize) -> World {
        let mut world = world();
        for i in 0..n {
            match i % 3 {
                0 => world.spawn(pos(i as f32)).unwrap(),
                1 => world.spawn((pos(i as f32), vel(0.0))).unwrap(),
                _ => world.spawn((pos(i as f32), Health(i as u32))).unwrap(),
            };
        }
        world
    }

    #[test]
    fn test_chunks_cover_every_row_once() {
        let world = populated(1000);
        let query = world.query::<&Position>();
        let mut expected = query.entity_ids(&world);
        expected.sort();

        for chunk_size in [1, 7, 64, 333, 1000, 5000] {
            let mut seen = Vec::new();
            for chunk in query.chunks(&world, chunk_size) {
                assert!(chunk.len() <= chunk_size);
                assert!(!chunk.is_empty());
                seen.extend(chunk.into_iter().map(|(e, _)| e));
            }
            seen.sort();
            assert_eq!(seen, expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_chunks_are_contiguous_ranges() {
        let world = populated(100);
        let query = world.query::<&Position>();

        for chunk in query.chunks(&world, 10) {
            let archetype = &world.archetypes()[chunk.archetype()];
            let start = chunk.start_row();
            assert_eq!(
                chunk.entities(),
                &archetype.entities()[start..start + chunk.len()]
            );
        }
    }

    #[test]
    fn test_chunk_channel_closes() {
        let world = populated(10);
        let receiver = world.query::<&Position>().chunks(&world, 3);
        let drained = receiver.iter().count();
        assert!(drained >= 4);
        assert!(receiver.recv().is_err());
    }

    #[test]
    #[should_panic(expected = "chunk size must be greater than zero")]
    fn test_zero_chunk_size_panics() {
        let world = populated(3);
        let _ = world.query::<&Position>().chunks(&world, 0);
    }

    #[test]
    fn test_chunks_filtered() {
        let world = populated(300);
        let query = world.query::<&Position>();
        let predicate = |_: EntityId, p: &&Position| p.x < 100.0;

        let count: usize = query
            .chunks_filtered(&world, 16, &predicate)
            .into_iter()
            .map(|chunk| chunk.into_iter().count())
            .sum();
        assert_eq!(count, 100);
    }

    #[test]
    fn test_chunks_mut_filtered_writes_accepted_rows() {
        let mut world = populated(300);
        let query = world.query::<&mut Position>();
        let predicate = |_: EntityId, p: &&mut Position| p.x >= 150.0;

        let receiver = query.chunks_mut_filtered(&mut world, 16, &predicate);
        std::thread::scope(|scope| {
            for _ in 0..2 {
                let receiver = receiver.clone();
                scope.spawn(move || {
                    for chunk in receiver {
                        for (_, p) in chunk {
                            p.y = 1.0;
                        }
                    }
                });
            }
        });
        drop(receiver);

        let read = world.query::<&Position>();
        assert_eq!(read.iter(&world).filter(|(_, p)| p.y > 0.0).count(), 150);
        assert!(read.iter(&world).all(|(_, p)| (p.y > 0.0) == (p.x >= 150.0)));
    }

    #[test]
    fn test_chunks_consumed_on_threads() {
        let world = populated(2000);
        let query = world.query::<(&Position, Option<&Health>)>();
        let seen = Mutex::new(HashSet::new());
        let receiver = query.chunks(&world, 50);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let receiver = receiver.clone();
                let seen = &seen;
                scope.spawn(move || {
                    for chunk in receiver {
                        let mut local = Vec::new();
                        for (e, _) in chunk {
                            local.push(e);
                        }
                        seen.lock().extend(local);
                    }
                });
            }
        });

        assert_eq!(seen.into_inner().len(), query.count(&world));
    }

    #[test]
    fn test_par_for_each() {
        let world = populated(3000);
        let query = world.query::<&Position>();
        let visited = AtomicUsize::new(0);

        query.par_for_each(&world, 128, |_, _| {
            visited.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visited.into_inner(), 3000);
    }

    #[test]
    fn test_par_for_each_mut_disjoint_writes() {
        let mut world = populated(3000);
        let query = world.query::<&mut Position>();

        query.par_for_each_mut(&mut world, 100, |_, p| p.y += 1.0);
        query.par_for_each_mut(&mut world, 7, |_, p| p.y += 1.0);

        assert!(query.iter_mut(&mut world).all(|(_, p)| p.y == 2.0));
    }

    #[test]
    fn test_chunks_mut_on_threads() {
        let mut world = populated(500);
        let query = world.query::<(&mut Position, Option<&Velocity>)>();
        let receiver = query.chunks_mut(&mut world, 32);

        std::thread::scope(|scope| {
            for _ in 0..3 {
                let receiver = receiver.clone();
                scope.spawn(move || {
                    for chunk in receiver {
                        for (_, (p, _)) in chunk {
                            p.x = -1.0;
                        }
                    }
                });
            }
        });
        drop(receiver);

        assert_eq!(
            world
                .query::<&Position>()
                .iter(&world)
                .filter(|(_, p)| p.x == -1.0)
                .count(),
            500
        );
    }
}
