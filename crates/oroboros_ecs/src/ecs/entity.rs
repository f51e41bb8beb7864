//! # Entity Management
//!
//! Entities are dense integer ids with no data of their own. Each id slot
//! records whether the entity exists and which components it carries.
//! Destroyed ids are recycled smallest-first to keep the live range compact,
//! which bounds the number of pool pages.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use tracing::{trace, warn};

use super::mask::ComponentMask;
use crate::error::{EcsError, EcsResult};

/// Identifier of an entity.
///
/// `u32::MAX` is reserved as the "no entity" sentinel ([`EntityId::INVALID`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// The "no entity" sentinel.
    pub const INVALID: Self = Self(u32::MAX);

    /// Number of usable ids (`0..ID_LIMIT`). Equal to the sentinel's raw value.
    pub const ID_LIMIT: u32 = u32::MAX;

    /// Creates an entity id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Creates an entity id from a storage index. Indices past the id
    /// range map to [`EntityId::INVALID`].
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        u32::try_from(index).map_or(Self::INVALID, Self)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the id as an index into id-keyed storage.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks that this is not the sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("<invalid>")
        }
    }
}

/// Per-id entity record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    /// Whether this id is currently live.
    pub exists: bool,
    /// Components currently attached.
    pub components: ComponentMask,
}

/// Hands out entity ids and owns the per-id records.
///
/// Freed ids sit in a min-heap and are reused smallest-first before any
/// never-used id is issued.
#[derive(Debug)]
pub struct EntityAllocator {
    /// Id-indexed records. Grows to the highest id ever issued.
    entities: Vec<Entity>,
    /// Destroyed ids awaiting reuse.
    free_ids: BinaryHeap<Reverse<EntityId>>,
    /// Ids `0..limit` may be issued.
    limit: u32,
    /// Number of live entities.
    alive_count: usize,
}

impl EntityAllocator {
    /// Creates an allocator that issues ids in `0..limit`.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            entities: Vec::new(),
            free_ids: BinaryHeap::new(),
            limit,
            alive_count: 0,
        }
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// One past the highest id ever issued.
    #[inline]
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.entities.len()
    }

    /// Issues an id: the smallest freed id if any, else the next unused one.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityIdsExhausted`] when every id below the
    /// limit is live.
    pub fn allocate(&mut self) -> EcsResult<EntityId> {
        let id = if let Some(Reverse(id)) = self.free_ids.pop() {
            id
        } else {
            let next = self.entities.len();
            if next >= self.limit as usize {
                warn!(limit = self.limit, "entity ids exhausted");
                return Err(EcsError::EntityIdsExhausted { limit: self.limit });
            }
            self.entities.push(Entity::default());
            EntityId::from_index(next)
        };

        self.entities[id.index()] = Entity {
            exists: true,
            components: ComponentMask::new(),
        };
        self.alive_count += 1;
        trace!(entity = id.raw(), "entity created");
        Ok(id)
    }

    /// Marks a live id as destroyed and queues it for reuse.
    ///
    /// The caller must already have released the entity's component storage;
    /// the mask is cleared here.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if `id` is not live.
    pub fn release(&mut self, id: EntityId) -> EcsResult<()> {
        let entity = self.get_mut(id).ok_or(EcsError::EntityNotFound(id))?;
        entity.components.clear();
        entity.exists = false;
        self.free_ids.push(Reverse(id));
        self.alive_count -= 1;
        trace!(entity = id.raw(), "entity destroyed");
        Ok(())
    }

    /// Bounds-checked existence test.
    #[inline]
    #[must_use]
    pub fn exists(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Record of a live entity.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).filter(|e| e.exists)
    }

    /// Mutable record of a live entity.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.index()).filter(|e| e.exists)
    }

    /// Iterates over live entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.exists)
            .map(|(index, e)| (EntityId::from_index(index), e))
    }
}
