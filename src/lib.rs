//! A data-oriented Entity-Component-System runtime.
//!
//! This crate is the substrate of an ECS: dense per-type component
//! storage with O(1) forward/back indexing and a cache-compacting
//! `optimize` pass ([`storage`]), generational entity handles and an
//! allocator that recycles them ([`entity`]), an entity directory that
//! tracks which components each entity has and two views of the active
//! set ([`directory`]), a lock-free deferred command dispatcher that makes
//! mutations issued mid-frame safe and replayable ([`dispatcher`]), and a
//! stable radix fold that turns a key-tagged entity list into an ordered,
//! bucketed working set a process can iterate (optionally in parallel
//! within a bucket) ([`remap`]).
//!
//! [`world::World`] ties these together and drives registered
//! [`process::Process`]es each tick through MUTABLE → REMAP → UPDATE →
//! MUTABLE.
//!
//! ```
//! use dod_ecs::{World, WorldConfig};
//!
//! struct Position(f32, f32);
//!
//! let mut world = World::new(WorldConfig::default());
//! let e = world.build_entity().with(Position(0.0, 0.0)).build();
//! assert!(world.get_component::<Position>(e).is_some());
//! ```

#![deny(missing_docs)]
#![allow(clippy::needless_lifetimes)]

pub mod aspect;
pub mod bitmask;
pub mod directory;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod process;
pub mod remap;
pub mod storage;
pub mod world;

pub mod prelude;

pub use aspect::{iter_aspect, Aspect, AspectComponent, Read, Write};
#[cfg(feature = "parallel")]
pub use aspect::par_iter_bucket;
pub use bitmask::{BitMask, MAX_COMPONENT_TYPES};
pub use dispatcher::Commands;
pub use entity::EntityId;
pub use error::WorldError;
pub use process::{Process, ProcessId};
pub use remap::{fold_and_reorder, Bucket, RemapList, EXCLUDED_KEY};
pub use storage::ComponentStorage;
pub use world::{Component, EntityBuilder, World, WorldConfig};
