//! # System Data
//!
//! Per-entity state private to a system, derived from one governing
//! component. Entries are stored outside the world and evicted by
//! [`SystemData::sweep`] once their owner loses the governing component.

// SAFETY: a typed view over a type-erased ComponentPool.
#![allow(unsafe_code)]

use std::marker::PhantomData;

use tracing::trace;

use super::component::ComponentId;
use super::entity::EntityId;
use super::world::World;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::memory::ComponentPool;

/// A typed pool of `T` bound to a governing component.
///
/// Invariant after every [`sweep`](Self::sweep): no entity holds a `T`
/// unless it is alive and carries the governing component.
///
/// # Example
///
/// ```rust
/// use oroboros_ecs::{SystemData, World};
///
/// let mut world = World::new();
/// let body = world.register_component("Body", 16usize).unwrap();
/// let e = world.new_entity().unwrap();
/// world.insert_component(e, body, [0u64; 2]).unwrap();
///
/// let mut contacts: SystemData<Vec<u32>> = SystemData::new(body);
/// contacts.get_or_insert_default(e).push(7);
///
/// world.remove_component(e, body).unwrap();
/// assert_eq!(contacts.sweep(&world), 1);
/// assert!(!contacts.has(e));
/// ```
pub struct SystemData<T> {
    governing: ComponentId,
    data: ComponentPool,
    _marker: PhantomData<T>,
}

impl<T> SystemData<T> {
    /// Creates an empty store with the default page size.
    #[must_use]
    pub fn new(governing: ComponentId) -> Self {
        Self::with_page_size(governing, DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store whose pool uses `page_size` slots per page.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    #[must_use]
    pub fn with_page_size(governing: ComponentId, page_size: usize) -> Self {
        Self {
            governing,
            data: ComponentPool::for_type::<T>(page_size),
            _marker: PhantomData,
        }
    }

    /// The component whose presence keeps entries alive.
    #[inline]
    #[must_use]
    pub const fn governing_component(&self) -> ComponentId {
        self.governing
    }

    /// Whether `id` has an entry.
    #[inline]
    #[must_use]
    pub fn has(&self, id: EntityId) -> bool {
        self.data.has(id)
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stores `value` for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` already has an entry.
    pub fn add(&mut self, id: EntityId, value: T) -> &mut T {
        let slot = self.data.add(id).cast::<T>();
        // SAFETY: the pool slot is sized and aligned for T, freshly claimed
        // and unaliased. Writing does not drop the stale bytes in it.
        unsafe {
            slot.as_ptr().write(value);
            &mut *slot.as_ptr()
        }
    }

    /// The entry for `id`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        // SAFETY: occupied slots always hold an initialized T (written in
        // `add`), and the shared borrow of self prevents mutation.
        self.data.get(id).map(|slot| unsafe { &*slot.cast::<T>().as_ptr() })
    }

    /// The entry for `id`, mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        // SAFETY: as in `get`; the exclusive borrow of self makes this the
        // only reference to the slot.
        self.data
            .get(id)
            .map(|slot| unsafe { &mut *slot.cast::<T>().as_ptr() })
    }

    /// The entry for `id`, created with `f` if absent.
    pub fn get_or_insert_with(&mut self, id: EntityId, f: impl FnOnce() -> T) -> &mut T {
        if let Some(slot) = self.data.get(id) {
            // SAFETY: the slot is occupied, see `get_mut`.
            return unsafe { &mut *slot.cast::<T>().as_ptr() };
        }
        self.add(id, f())
    }

    /// The entry for `id`, default-constructed if absent.
    pub fn get_or_insert_default(&mut self, id: EntityId) -> &mut T
    where
        T: Default,
    {
        self.get_or_insert_with(id, T::default)
    }

    /// Removes and returns the entry for `id`.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.data.get(id)?.cast::<T>();
        self.data.remove(id);
        // SAFETY: the slot held an initialized T and is no longer occupied,
        // so the value is moved out exactly once.
        Some(unsafe { slot.as_ptr().read() })
    }

    /// Evicts every entry whose owner is dead or lacks the governing
    /// component. Returns the number of entries evicted.
    pub fn sweep(&mut self, world: &World) -> usize {
        let stale: Vec<EntityId> = self
            .data
            .occupied()
            .filter(|&id| !world.has_component(id, self.governing))
            .collect();
        for &id in &stale {
            trace!(entity = id.raw(), governing = self.governing.raw(), "evicted system data");
            drop(self.remove(id));
        }
        stale.len()
    }

    /// Entries in ascending entity order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.data.occupied().filter_map(|id| self.get(id).map(|value| (id, value)))
    }
}

impl<T> Drop for SystemData<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        for id in self.data.occupied() {
            if let Some(slot) = self.data.get(id) {
                // SAFETY: each occupied slot holds an initialized T and is
                // dropped once; the pool frees the pages right after.
                unsafe { slot.cast::<T>().as_ptr().drop_in_place() };
            }
        }
    }
}

impl<T> std::fmt::Debug for SystemData<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemData")
            .field("governing", &self.governing)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn world_with_body() -> (World, ComponentId) {
        let mut world = World::new();
        let body = world.register_component("Body", 4usize).unwrap();
        (world, body)
    }

    #[test]
    fn test_add_get_remove() {
        let (_, body) = world_with_body();
        let mut data: SystemData<String> = SystemData::with_page_size(body, 8);
        let id = EntityId::new(11);

        data.add(id, "cached".to_owned()).push_str(" path");
        assert_eq!(data.get(id).map(String::as_str), Some("cached path"));
        assert_eq!(data.len(), 1);

        assert_eq!(data.remove(id).as_deref(), Some("cached path"));
        assert!(data.get(id).is_none());
        assert!(data.remove(id).is_none());
    }

    #[test]
    fn test_get_or_insert_default_keeps_existing() {
        let (_, body) = world_with_body();
        let mut data: SystemData<u32> = SystemData::new(body);
        let id = EntityId::new(0);

        *data.get_or_insert_default(id) += 3;
        *data.get_or_insert_default(id) += 4;
        assert_eq!(data.get(id), Some(&7));
    }

    #[test]
    fn test_sweep_follows_governing_component() {
        let (mut world, body) = world_with_body();
        let keep = world.new_entity().unwrap();
        let lose = world.new_entity().unwrap();
        let gone = world.new_entity().unwrap();
        for id in [keep, lose, gone] {
            world.insert_component(id, body, 0u32).unwrap();
        }

        let mut data: SystemData<u64> = SystemData::new(body);
        for id in [keep, lose, gone] {
            data.add(id, u64::from(id.raw()));
        }

        world.remove_component(lose, body).unwrap();
        world.destroy_entity(gone).unwrap();

        assert_eq!(data.sweep(&world), 2);
        let left: Vec<EntityId> = data.iter().map(|(id, _)| id).collect();
        assert_eq!(left, vec![keep]);
        assert_eq!(data.sweep(&world), 0);
    }

    #[test]
    fn test_values_dropped_on_remove_sweep_and_drop() {
        let (world, body) = world_with_body();
        let token = Rc::new(());
        let mut data: SystemData<Rc<()>> = SystemData::new(body);
        for raw in 0..4 {
            data.add(EntityId::new(raw), Rc::clone(&token));
        }
        assert_eq!(Rc::strong_count(&token), 5);

        drop(data.remove(EntityId::new(0)));
        assert_eq!(Rc::strong_count(&token), 4);

        // No entity is alive, so sweep evicts everything.
        data.add(EntityId::new(0), Rc::clone(&token));
        assert_eq!(data.sweep(&world), 4);
        assert_eq!(Rc::strong_count(&token), 1);

        data.add(EntityId::new(9), Rc::clone(&token));
        drop(data);
        assert_eq!(Rc::strong_count(&token), 1);
    }
}
