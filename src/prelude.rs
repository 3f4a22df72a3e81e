//! Convenience re-export of the types most call sites need.
//!
//! ```
//! use dod_ecs::prelude::*;
//! ```

pub use crate::aspect::{iter_aspect, Aspect, Read, Write};
pub use crate::bitmask::BitMask;
pub use crate::dispatcher::Commands;
pub use crate::entity::EntityId;
pub use crate::process::{Process, ProcessId};
pub use crate::remap::{fold_and_reorder, Bucket, RemapList};
pub use crate::world::{Component, World, WorldConfig};
