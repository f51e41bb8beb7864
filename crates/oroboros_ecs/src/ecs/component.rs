//! # Component Kinds
//!
//! A component kind is a named byte layout registered with a
//! [`World`](crate::World). Each kind gets a small integer id that doubles
//! as its bit in a [`ComponentMask`](super::ComponentMask) and its index
//! into the world's pool table.

use std::fmt;

use super::layout::ComponentLayout;
use crate::error::{EcsError, EcsResult};

/// Maximum number of component kinds per world (the mask width).
pub const MAX_COMPONENTS: usize = 64;

/// Identifier of a component kind, in `0..MAX_COMPONENTS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(u8);

impl ComponentId {
    /// Creates a component id.
    ///
    /// # Panics
    ///
    /// Panics if `raw >= 64`.
    #[inline]
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        assert!((raw as usize) < MAX_COMPONENTS, "Component id must be below 64");
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns the id as an index into the pool table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The single mask bit for this id.
    #[inline]
    pub(crate) const fn bit(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues component ids for one world, monotonically from zero.
#[derive(Debug, Default)]
pub struct ComponentIdAllocator {
    next: usize,
}

impl ComponentIdAllocator {
    /// Creates an allocator whose first id is 0.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Number of ids issued so far.
    #[inline]
    #[must_use]
    pub const fn issued(&self) -> usize {
        self.next
    }

    /// Issues the next id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentLimitReached`] once 64 ids are issued.
    pub fn allocate(&mut self) -> EcsResult<ComponentId> {
        let raw = u8::try_from(self.next)
            .ok()
            .filter(|&raw| (raw as usize) < MAX_COMPONENTS)
            .ok_or(EcsError::ComponentLimitReached {
                limit: MAX_COMPONENTS,
            })?;
        self.next += 1;
        Ok(ComponentId(raw))
    }
}

/// A registered component kind.
#[derive(Clone, Debug)]
pub struct Component {
    id: ComponentId,
    name: String,
    layout: ComponentLayout,
    page_size: usize,
}

impl Component {
    pub(crate) fn new(
        id: ComponentId,
        name: String,
        layout: ComponentLayout,
        page_size: usize,
    ) -> Self {
        Self {
            id,
            name,
            layout,
            page_size,
        }
    }

    /// The kind's id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// The kind's unique name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte layout of one instance.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &ComponentLayout {
        &self.layout
    }

    /// Slots per page in this kind's pool.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }
}
