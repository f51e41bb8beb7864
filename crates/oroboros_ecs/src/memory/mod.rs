//! # Memory Management
//!
//! Paged component storage.
//!
//! ## Design Philosophy
//!
//! Pages are allocated on first touch and never move:
//! - No bulk reallocation when an entity id grows past the current range
//! - Slot addresses stay valid while the slot is occupied
//! - Sparse ids only pay for the pages they touch

mod bitset;
mod pool;

pub use bitset::{OccupancyBits, OccupiedIter};
pub use pool::ComponentPool;
