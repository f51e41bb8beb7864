//! # Component Layouts
//!
//! Component kinds are not Rust types: their shape comes from a runtime
//! description (a schema, a size, a Rust type used as a template). The
//! registry asks a [`TypedLayout`] for a [`ComponentLayout`] once, at
//! registration, and sizes the kind's pool from it.

// SAFETY: drop hooks call `drop_in_place` on type-erased slots.
#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::NonNull;

use bytemuck::Pod;

/// Type-erased destructor for one component value.
///
/// # Safety
///
/// The pointer must point at a valid, initialized value of the type the
/// hook was created for, and the value must not be used afterwards.
pub type DropFn = unsafe fn(NonNull<u8>);

unsafe fn drop_value<T>(ptr: NonNull<u8>) {
    // SAFETY: guaranteed by the `DropFn` contract.
    unsafe { ptr.cast::<T>().as_ptr().drop_in_place() };
}

/// Largest alignment inferred for layouts given only a byte size.
const MAX_INFERRED_ALIGN: usize = 16;

/// A named field inside a component layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Byte offset from the start of the component.
    pub offset: usize,
    /// Field size in bytes.
    pub size: usize,
    /// Field alignment.
    pub align: usize,
}

/// Byte shape of one component kind.
///
/// A plain-data kind has no destructor and every byte of its values is
/// initialized, so the world may expose slots as bytes or `Pod` views.
#[derive(Clone, Debug)]
pub struct ComponentLayout {
    layout: Layout,
    fields: Vec<FieldDescriptor>,
    drop_fn: Option<DropFn>,
    plain_data: bool,
}

impl ComponentLayout {
    /// A plain-data layout with no fields and no destructor.
    #[must_use]
    pub const fn from_layout(layout: Layout) -> Self {
        Self {
            layout,
            fields: Vec::new(),
            drop_fn: None,
            plain_data: true,
        }
    }

    /// A plain-data layout of `size` bytes.
    ///
    /// Alignment is the largest power of two dividing `size`, capped at 16.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds `isize::MAX` once rounded to its alignment.
    #[must_use]
    pub fn bytes(size: usize) -> Self {
        let align = if size == 0 {
            1
        } else {
            (1usize << size.trailing_zeros()).min(MAX_INFERRED_ALIGN)
        };
        let layout = Layout::from_size_align(size, align)
            .unwrap_or_else(|_| panic!("Component of {size} bytes is too large"));
        Self::from_layout(layout)
    }

    /// The layout of an arbitrary Rust type `T`, with a destructor if `T`
    /// needs one.
    ///
    /// `T` may contain padding, so the kind is never plain data: the world
    /// refuses byte and typed views of it. Use [`pod`](Self::pod) for types
    /// that are.
    #[must_use]
    pub fn of<T>() -> Self {
        Self {
            layout: Layout::new::<T>(),
            fields: Vec::new(),
            drop_fn: std::mem::needs_drop::<T>().then_some(drop_value::<T> as DropFn),
            plain_data: false,
        }
    }

    /// The layout of a plain-data type `T`.
    #[must_use]
    pub fn pod<T: Pod>() -> Self {
        Self::from_layout(Layout::new::<T>())
    }

    /// Attaches field descriptors (for introspection only).
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    /// Size and alignment.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.layout.size()
    }

    /// Alignment in bytes.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.layout.align()
    }

    /// Field descriptors, if the supplier provided any.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The destructor, if values of this kind own resources.
    #[inline]
    #[must_use]
    pub const fn drop_fn(&self) -> Option<DropFn> {
        self.drop_fn
    }

    /// Whether values are plain bytes: no destructor and no padding.
    #[inline]
    #[must_use]
    pub const fn is_plain_data(&self) -> bool {
        self.plain_data
    }
}

/// Supplies the byte layout of a component kind at registration.
pub trait TypedLayout {
    /// Resolves the layout. Called once per registration.
    fn component_layout(&self) -> ComponentLayout;
}

impl TypedLayout for ComponentLayout {
    fn component_layout(&self) -> ComponentLayout {
        self.clone()
    }
}

impl TypedLayout for Layout {
    fn component_layout(&self) -> ComponentLayout {
        ComponentLayout::from_layout(*self)
    }
}

/// A bare byte size, aligned as in [`ComponentLayout::bytes`].
impl TypedLayout for usize {
    fn component_layout(&self) -> ComponentLayout {
        ComponentLayout::bytes(*self)
    }
}

/// Builds a C-ordered struct layout field by field.
///
/// ```rust
/// use std::alloc::Layout;
/// use oroboros_ecs::{StructLayout, TypedLayout};
///
/// let health = StructLayout::new()
///     .field("current", Layout::new::<u16>())
///     .field("max", Layout::new::<u32>())
///     .component_layout();
///
/// assert_eq!(health.size(), 8);
/// assert_eq!(health.fields()[1].offset, 4);
/// ```
#[derive(Clone, Debug)]
pub struct StructLayout {
    fields: Vec<FieldDescriptor>,
    /// Fields so far, without tail padding.
    layout: Layout,
}

impl Default for StructLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl StructLayout {
    /// An empty struct.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: Vec::new(),
            layout: Layout::new::<()>(),
        }
    }

    /// Appends a field at the next offset aligned for it.
    ///
    /// # Panics
    ///
    /// Panics if the struct would exceed `isize::MAX` bytes.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, layout: Layout) -> Self {
        let name = name.into();
        let (extended, offset) = self
            .layout
            .extend(layout)
            .unwrap_or_else(|_| panic!("Struct layout overflows at field {name}"));
        self.fields.push(FieldDescriptor {
            name,
            offset,
            size: layout.size(),
            align: layout.align(),
        });
        self.layout = extended;
        self
    }
}

impl TypedLayout for StructLayout {
    fn component_layout(&self) -> ComponentLayout {
        ComponentLayout::from_layout(self.layout.pad_to_align())
            .with_fields(self.fields.clone())
    }
}
