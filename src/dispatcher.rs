//! The deferred command dispatcher: mutations issued while the world isn't
//! in its MUTABLE phase are recorded here and replayed on `unlock`.
//!
//! The source this crate is modeled on bump-allocates command records into
//! a raw, 128-byte-aligned byte arena and destructs payloads through a
//! function pointer stashed alongside them. A safe-Rust rewrite has no
//! sound way to placement-construct arbitrary `T` into raw bytes and later
//! move it out without `unsafe` sprawling across every call site, so this
//! crate substitutes `crossbeam_queue::SegQueue`, a lock-free MPMC queue:
//! enqueue is still a single atomic operation (push), multiple threads can
//! enqueue concurrently with no lock held across the call (the same
//! property §5 asks for), and typed payloads travel as boxed closures
//! (mirroring how `LazyUpdate` in the teacher crate erases its typed
//! inserts). See `DESIGN.md` for the full substitution rationale.
//!
//! The fatal-overflow semantics are preserved by tracking how many
//! 128-byte blocks the configured arena size would hold and panicking once
//! that many commands have been enqueued in one locked window.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;

use crate::entity::{EntityId, IdGenerator};
use crate::world::{Component, World};

/// Bytes a command header plus small inline payload is rounded up to, to
/// avoid false sharing between concurrently-enqueued commands.
const COMMAND_BLOCK_BYTES: usize = 128;

enum Command {
    NotifyChanges(EntityId),
    CreateEntity(EntityId),
    DestroyEntity(EntityId),
    DestroyAll,
    Closure(Box<dyn FnOnce(&mut World) + Send>),
}

/// The lock-free command buffer. One per `World`.
pub struct Dispatcher {
    queue: SegQueue<Command>,
    capacity_blocks: usize,
    used_blocks: AtomicUsize,
    locked: AtomicBool,
}

impl Dispatcher {
    /// Creates a dispatcher sized for `arena_bytes` worth of commands
    /// (rounded down to whole 128-byte blocks).
    pub fn new(arena_bytes: usize) -> Self {
        Dispatcher {
            queue: SegQueue::new(),
            capacity_blocks: arena_bytes / COMMAND_BLOCK_BYTES,
            used_blocks: AtomicUsize::new(0),
            locked: AtomicBool::new(false),
        }
    }

    /// `true` while the dispatcher is in locked (deferred-mutation) mode.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn enqueue(&self, command: Command) {
        let used = self.used_blocks.fetch_add(1, Ordering::SeqCst) + 1;
        if used > self.capacity_blocks {
            panic!(
                "dispatcher arena exhausted: {} commands queued against a {}-block budget",
                used, self.capacity_blocks
            );
        }
        self.queue.push(command);
    }

    /// Enters locked mode: subsequent mutation calls must go through
    /// `Commands`, recorded here instead of applied immediately.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Leaves locked mode and replays every recorded command against
    /// `world`, in the exact order they were enqueued.
    ///
    /// The caller (`World::update`) must flip the ID generator back to
    /// unlocked *before* calling this, since replaying a `DestroyEntity`
    /// releases the ID, which is only valid unlocked.
    pub fn unlock_and_drain(&self, world: &mut World) {
        self.locked.store(false, Ordering::SeqCst);
        while let Some(command) = self.queue.pop() {
            match command {
                Command::NotifyChanges(id) => world.notify_changes(id),
                Command::CreateEntity(id) => world.create_entity_with_id(id),
                Command::DestroyEntity(id) => world.destroy_entity(id),
                Command::DestroyAll => world.destroy_all(),
                Command::Closure(f) => f(world),
            }
        }
        self.used_blocks.store(0, Ordering::SeqCst);
    }
}

/// A handle processes use from inside `remap`/`update` to issue mutations.
///
/// Every method here always defers: a `Commands` is only ever handed to a
/// process while the world is in REMAP or UPDATE phase, so there is no
/// "apply immediately" path to choose between. `World`'s own methods
/// (`create_entity`, `add_component`, ...) take `&mut World` and apply
/// directly — since processes are only ever given `&World`, they
/// structurally cannot reach those, which is how phase-gating is enforced
/// here instead of with a runtime check.
pub struct Commands<'a> {
    pub(crate) id_gen: &'a IdGenerator,
    pub(crate) dispatcher: &'a Dispatcher,
}

impl<'a> Commands<'a> {
    /// Reserves a fresh or recycled ID from the locked generator and
    /// records a `CreateEntity` for replay.
    pub fn create_entity(&self) -> EntityId {
        let id = self.id_gen.acquire_locked();
        self.dispatcher.enqueue(Command::CreateEntity(id));
        id
    }

    /// Records a `DestroyEntity` for replay.
    pub fn destroy_entity(&self, id: EntityId) {
        self.dispatcher.enqueue(Command::DestroyEntity(id));
    }

    /// Records a `DestroyAll` for replay.
    pub fn destroy_all(&self) {
        self.dispatcher.enqueue(Command::DestroyAll);
    }

    /// Records an `AddComponent` for replay. If `id` has since been
    /// destroyed by another deferred command in the same batch, replay
    /// logs a warning and drops the insert rather than panicking — the
    /// same "lazy command targeting a dead entity" tolerance the teacher
    /// crate's `LazyUpdate` documents.
    pub fn add_component<T: Component>(&self, id: EntityId, value: T) {
        self.dispatcher.enqueue(Command::Closure(Box::new(move |world: &mut World| {
            if !world.is_valid(id) {
                log::warn!("deferred add_component dropped: {:?} no longer exists", id);
                return;
            }
            world.add_component(id, value);
        })));
    }

    /// Records a `RemoveComponent` for replay, with the same dead-entity
    /// tolerance as `add_component`.
    pub fn remove_component<T: Component>(&self, id: EntityId) {
        self.dispatcher.enqueue(Command::Closure(Box::new(move |world: &mut World| {
            if !world.is_valid(id) {
                log::warn!("deferred remove_component dropped: {:?} no longer exists", id);
                return;
            }
            world.remove_component::<T>(id);
        })));
    }

    /// Records a `NotifyChanges` for replay.
    pub fn notify_changes(&self, id: EntityId) {
        self.dispatcher.enqueue(Command::NotifyChanges(id));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::process::Process;
    use crate::world::WorldConfig;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Marker(u32);

    #[test]
    fn enqueue_replays_in_fifo_order() {
        let mut gen = IdGenerator::new();
        let a = gen.acquire();
        let b = gen.acquire();

        let dispatcher = Dispatcher::new(4096);
        dispatcher.lock();
        assert!(dispatcher.is_locked());
        dispatcher.enqueue(Command::NotifyChanges(a));
        dispatcher.enqueue(Command::NotifyChanges(b));

        let mut order = Vec::new();
        while let Some(cmd) = dispatcher.queue.pop() {
            match cmd {
                Command::NotifyChanges(id) => order.push(id),
                _ => unreachable!(),
            }
        }
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn dead_entity_lazy_add_component_is_dropped_not_panicked() {
        let mut world = World::new(WorldConfig::default());
        let e = world.build_entity().with(Marker(1)).build();

        // `register_process` only keeps a `Weak` handle; hold the `Arc`
        // ourselves for the duration of the tick that drives it.
        let process = Arc::new(Mutex::new(DestroyThenAdd { target: e }));
        world.register_process(process.clone());
        world.update(1.0 / 60.0);

        assert!(!world.is_valid(e));
    }

    struct DestroyThenAdd {
        target: EntityId,
    }

    impl Process for DestroyThenAdd {
        fn remap(&mut self, _world: &World, _changed: &[EntityId], _max_index: u32) {}

        fn update(&mut self, _world: &World, commands: &Commands<'_>, _dt: f32) {
            // Both commands are recorded in this order; by the time the
            // second one replays, `target` no longer validates (the first
            // already destroyed it in the same drain), so it must be
            // dropped with a warning rather than panicking.
            commands.destroy_entity(self.target);
            commands.add_component(self.target, Marker(99));
        }
    }

    #[test]
    #[should_panic(expected = "dispatcher arena exhausted")]
    fn dispatcher_exhaustion_is_fatal() {
        // A 128-byte-budget dispatcher holds exactly one 128-byte block.
        let dispatcher = Dispatcher::new(128);
        dispatcher.lock();
        dispatcher.enqueue(Command::DestroyAll);
        dispatcher.enqueue(Command::DestroyAll);
    }
}
