//! # OROBOROS ECS
//!
//! Runtime-schema Entity Component System:
//! - Component kinds registered at runtime from byte layouts
//! - Paged pools with stable slot addresses
//! - Mask-based queries over up to 64 component kinds
//! - Named systems with per-invocation timing
//!
//! ## Architecture Rules
//!
//! 1. **Mask and pool never disagree** - every attach/detach updates both
//! 2. **Lowest free id first** - destroyed ids are reused smallest-first
//! 3. **Single-threaded** - a `World` is owned by one thread
//!
//! ## Example
//!
//! ```rust
//! use oroboros_ecs::World;
//!
//! let mut world = World::new();
//! let position = world.register_component("Position", 8usize).unwrap();
//! let velocity = world.register_component("Velocity", 8usize).unwrap();
//!
//! let ship = world.new_entity().unwrap();
//! world.insert_component(ship, position, [0.0f32, 0.0]).unwrap();
//! world.insert_component(ship, velocity, [1.0f32, 0.5]).unwrap();
//!
//! world
//!     .register_system("movement", move |world, dt| {
//!         let moving = world.mask_of(&["Position", "Velocity"])?;
//!         for id in world.get_entities(&moving) {
//!             let [vx, vy] = *world.component::<[f32; 2]>(id, velocity)?;
//!             let p = world.component_mut::<[f32; 2]>(id, position)?;
//!             p[0] += vx * dt;
//!             p[1] += vy * dt;
//!         }
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! world.invoke_system("movement", 2.0).unwrap();
//! assert_eq!(*world.component::<[f32; 2]>(ship, position).unwrap(), [2.0, 1.0]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::WorldConfig;
pub use ecs::{
    Component, ComponentId, ComponentLayout, ComponentMask, EntityId, StructLayout, System,
    SystemData, TypedLayout, World, MAX_COMPONENTS,
};
pub use error::{EcsError, EcsResult, SystemError};
pub use memory::ComponentPool;
