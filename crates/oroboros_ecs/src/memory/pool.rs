//! # Component Pool
//!
//! Paged, type-erased storage for every instance of one component kind,
//! keyed by entity id.

// SAFETY: Pages are raw allocations sized from a runtime layout.
// Every unsafe block states the invariant it relies on.
#![allow(unsafe_code)]
//!
//! ## Layout
//!
//! ```text
//! pages:  [ Page 0 ][ None ][ Page 2 ] ...
//!             │                 │
//!             ▼                 ▼
//!   | slot 0 | slot 1 | ... | slot N-1 |   (N = page_size, stride = padded size)
//!   occupied: 0b...0101
//! ```
//!
//! `page = id / page_size`, `slot = id % page_size`. Pages are allocated
//! lazily, zero-filled, and never move: growing the page table only moves
//! the page headers, so slot addresses stay valid until the slot is removed.
//!
//! The pool never runs destructors. Whoever constructs a value in a slot
//! is responsible for dropping it before calling [`ComponentPool::remove`],
//! and for leaving no padding bytes in it if the slot is read as bytes.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

use tracing::debug;

use super::bitset::OccupancyBits;
use crate::ecs::EntityId;
use crate::error::{EcsError, EcsResult};

/// A single lazily-allocated page of slots.
struct Page {
    /// Zero-initialized backing buffer of `page_size * stride` bytes.
    data: NonNull<u8>,
    /// Which slots hold a live value.
    occupied: OccupancyBits,
}

impl Page {
    fn allocate(layout: Layout, page_size: usize) -> Self {
        // SAFETY: layout has a non-zero size (max(1)) and a valid
        // power-of-two alignment, both checked in `ComponentPool::try_new`.
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(data) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };
        Self {
            data,
            occupied: OccupancyBits::new(page_size),
        }
    }

    /// Pointer to slot `slot`. Requires `slot < page_size`.
    #[inline]
    fn slot(&self, slot: usize, stride: usize) -> NonNull<u8> {
        debug_assert!(slot < self.occupied.len());
        // SAFETY: slot < page_size, so the offset stays inside the page
        // allocation of page_size * stride bytes (or is 0 for zero-sized
        // values). Offsetting a non-null pointer in bounds stays non-null.
        unsafe { NonNull::new_unchecked(self.data.as_ptr().add(slot * stride)) }
    }
}

/// Paged, type-erased storage keyed by [`EntityId`].
///
/// This storage guarantees:
/// - O(1) `has` / `add` / `get` / `remove`
/// - No single large reallocation: growth allocates one page at a time
/// - Stable slot addresses across unrelated adds and removes
///
/// # Thread Safety
///
/// This pool is NOT thread-safe and is neither `Send` nor `Sync`.
///
/// # Example
///
/// ```rust
/// use std::alloc::Layout;
/// use oroboros_ecs::{ComponentPool, EntityId};
///
/// let mut pool = ComponentPool::new(Layout::new::<[f32; 2]>(), 256);
/// let id = EntityId::new(300);
///
/// let slot = pool.add(id);
/// // SAFETY: the slot is valid, aligned for [f32; 2] and unaliased.
/// unsafe { slot.cast::<[f32; 2]>().as_ptr().write([1.0, 2.0]) };
///
/// assert!(pool.has(id));
/// assert_eq!(pool.slot_bytes(id).map(<[u8]>::len), Some(8));
/// pool.remove(id);
/// assert!(!pool.has(id));
/// ```
pub struct ComponentPool {
    /// Size and alignment of one component value.
    component_layout: Layout,
    /// Distance in bytes between consecutive slots.
    stride: usize,
    /// Slots per page.
    page_size: usize,
    /// Layout of one page's backing buffer.
    page_layout: Layout,
    /// Page table. `None` entries have never been touched or were released.
    pages: Vec<Option<Page>>,
    /// Number of occupied slots across all pages.
    len: usize,
}

impl ComponentPool {
    /// Creates an empty pool. No page is allocated until the first `add`.
    ///
    /// # Arguments
    ///
    /// * `component_layout` - Size and alignment of one component value
    /// * `page_size` - Slots per page
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero or a page would exceed `isize::MAX` bytes.
    #[must_use]
    pub fn new(component_layout: Layout, page_size: usize) -> Self {
        Self::try_new(component_layout, page_size).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Creates an empty pool, reporting unusable sizes instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `page_size` is zero or a page
    /// would exceed `isize::MAX` bytes.
    pub fn try_new(component_layout: Layout, page_size: usize) -> EcsResult<Self> {
        if page_size == 0 {
            return Err(EcsError::InvalidConfig(
                "page size must be greater than zero".to_owned(),
            ));
        }

        let stride = component_layout.pad_to_align().size();
        let page_layout = stride
            .checked_mul(page_size)
            .and_then(|bytes| Layout::from_size_align(bytes.max(1), component_layout.align()).ok())
            .ok_or_else(|| {
                EcsError::InvalidConfig(format!(
                    "page of {page_size} slots x {stride} bytes exceeds isize::MAX"
                ))
            })?;

        Ok(Self {
            component_layout,
            stride,
            page_size,
            page_layout,
            pages: Vec::new(),
            len: 0,
        })
    }

    /// Creates an empty pool sized for values of type `T`.
    #[must_use]
    pub fn for_type<T>(page_size: usize) -> Self {
        Self::new(Layout::new::<T>(), page_size)
    }

    /// Size and alignment of one stored value.
    #[inline]
    #[must_use]
    pub const fn component_layout(&self) -> Layout {
        self.component_layout
    }

    /// Size in bytes of one stored value.
    #[inline]
    #[must_use]
    pub const fn component_size(&self) -> usize {
        self.component_layout.size()
    }

    /// Slots per page.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the page table, including pages that are not allocated.
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of pages with a live backing buffer.
    #[must_use]
    pub fn allocated_page_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_some()).count()
    }

    #[inline]
    fn indices(&self, id: EntityId) -> (usize, usize) {
        let index = id.index();
        (index / self.page_size, index % self.page_size)
    }

    #[inline]
    fn page(&self, page: usize) -> Option<&Page> {
        self.pages.get(page).and_then(Option::as_ref)
    }

    /// Checks whether `id` currently has a value. Never allocates.
    #[inline]
    #[must_use]
    pub fn has(&self, id: EntityId) -> bool {
        let (page, slot) = self.indices(id);
        self.page(page).is_some_and(|p| p.occupied.get(slot))
    }

    /// Marks the slot for `id` occupied and returns a pointer to it.
    ///
    /// Allocates the page if needed. The slot holds zeroes on first use and
    /// whatever bytes the previous occupant left otherwise; the caller must
    /// construct a value in it.
    ///
    /// The pointer stays valid until `remove(id)`, [`release_empty_pages`]
    /// after that removal, or the pool is dropped.
    ///
    /// Writing through the pointer is `unsafe`. Besides the usual size and
    /// alignment requirements, a value written into a pool whose bytes are
    /// later read with [`slot_bytes`](Self::slot_bytes) must have no
    /// uninitialized (padding) bytes.
    ///
    /// [`release_empty_pages`]: Self::release_empty_pages
    ///
    /// # Panics
    ///
    /// Panics if `id` already has a value.
    pub fn add(&mut self, id: EntityId) -> NonNull<u8> {
        assert!(!self.has(id), "Slot for entity {id} is already occupied");

        let (page_idx, slot) = self.indices(id);
        if page_idx >= self.pages.len() {
            self.pages.resize_with(page_idx + 1, || None);
        }

        let (page_layout, page_size, stride) = (self.page_layout, self.page_size, self.stride);
        let page = self.pages[page_idx].get_or_insert_with(|| {
            debug!(page = page_idx, page_size, stride, "allocated component pool page");
            Page::allocate(page_layout, page_size)
        });
        page.occupied.set(slot);
        let ptr = page.slot(slot, stride);
        self.len += 1;
        ptr
    }

    /// Returns a pointer to the slot for `id`, or `None` if it is empty.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<NonNull<u8>> {
        let (page_idx, slot) = self.indices(id);
        let page = self.page(page_idx)?;
        page.occupied.get(slot).then(|| page.slot(slot, self.stride))
    }

    /// Bytes of the value stored for `id`.
    ///
    /// Relies on the contract of [`add`](Self::add): values written through
    /// the raw pointers carry no padding bytes.
    #[must_use]
    pub fn slot_bytes(&self, id: EntityId) -> Option<&[u8]> {
        let ptr = self.get(id)?;
        // SAFETY: the slot lies inside a live page and spans component_size
        // bytes. Pages are zero-filled on allocation and writers must not
        // leave padding bytes (see `add`), so every byte is initialized. The
        // shared borrow of self prevents mutation through the safe API for
        // the returned lifetime.
        Some(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.component_size()) })
    }

    /// Mutable bytes of the value stored for `id`.
    #[must_use]
    pub fn slot_bytes_mut(&mut self, id: EntityId) -> Option<&mut [u8]> {
        let ptr = self.get(id)?;
        // SAFETY: as in `slot_bytes`; the exclusive borrow of self makes this
        // the only safe view of the slot.
        Some(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.component_size()) })
    }

    /// Clears the occupancy bit for `id`. Does not drop the stored value.
    ///
    /// Returns `true` if the slot was occupied.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let (page_idx, slot) = self.indices(id);
        let Some(page) = self.pages.get_mut(page_idx).and_then(Option::as_mut) else {
            return false;
        };
        let removed = page.occupied.clear(slot);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Iterates over the ids with a value, in ascending order.
    pub fn occupied(&self) -> impl Iterator<Item = EntityId> + '_ {
        let page_size = self.page_size;
        self.pages.iter().enumerate().flat_map(move |(page_idx, page)| {
            page.iter().flat_map(move |page| {
                page.occupied
                    .iter()
                    .map(move |slot| EntityId::from_index(page_idx * page_size + slot))
            })
        })
    }

    /// Frees every page that has no occupied slot.
    ///
    /// Returns the number of pages released.
    pub fn release_empty_pages(&mut self) -> usize {
        let mut released = 0;
        for entry in &mut self.pages {
            if entry.as_ref().is_some_and(|page| page.occupied.count() == 0) {
                if let Some(page) = entry.take() {
                    // SAFETY: the page was allocated in `Page::allocate` with
                    // page_layout and is no longer reachable.
                    unsafe { dealloc(page.data.as_ptr(), self.page_layout) };
                    released += 1;
                }
            }
        }
        while matches!(self.pages.last(), Some(None)) {
            self.pages.pop();
        }
        if released > 0 {
            debug!(released, "released empty component pool pages");
        }
        released
    }
}

impl Drop for ComponentPool {
    fn drop(&mut self) {
        for page in self.pages.drain(..).flatten() {
            // SAFETY: every page was allocated with page_layout and is
            // dropped exactly once here.
            unsafe { dealloc(page.data.as_ptr(), self.page_layout) };
        }
    }
}

impl std::fmt::Debug for ComponentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentPool")
            .field("component_size", &self.component_layout.size())
            .field("component_align", &self.component_layout.align())
            .field("page_size", &self.page_size)
            .field("pages", &self.pages.len())
            .field("len", &self.len)
            .finish()
    }
}
