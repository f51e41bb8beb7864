//! # Entity Component System
//!
//! A runtime-schema ECS: component kinds are byte layouts registered at
//! startup, not Rust types.
//!
//! ## Design Philosophy
//!
//! - One paged pool per component kind, indexed directly by entity id
//! - One 64-bit mask per entity; queries are mask superset tests
//! - Smallest-id-first entity reuse keeps pools dense
//! - Systems are named closures dispatched by name

mod component;
mod entity;
mod layout;
mod mask;
mod system;
mod system_data;
mod world;

pub use component::{Component, ComponentId, ComponentIdAllocator, MAX_COMPONENTS};
pub use entity::{Entity, EntityAllocator, EntityId};
pub use layout::{ComponentLayout, DropFn, FieldDescriptor, StructLayout, TypedLayout};
pub use mask::{ComponentMask, MaskIter};
pub use system::{System, SystemFn, SystemRegistry};
pub use system_data::SystemData;
pub use world::World;
