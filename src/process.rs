//! The process base: lifecycle hooks `remap`/`update` and the registry
//! `World::update` drives through MUTABLE → REMAP → UPDATE → MUTABLE.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::dispatcher::Commands;
use crate::entity::EntityId;
use crate::world::World;

/// A unit of per-frame work operating on entities matching an aspect.
///
/// `remap` is called whenever the changed-set is non-empty (to let the
/// process refresh its internal working set) and once, with the full
/// active list, the first time the process is driven after registering.
/// `update` runs once per tick in the UPDATE phase, in registration order
/// with every other active process.
pub trait Process: Send + 'static {
    /// Refreshes internal working-set state for the ids in `changed`
    /// (or, on the first call after registering, for every currently
    /// active entity). `max_index` is one past the highest entity index
    /// ever assigned, the size a process should give its own
    /// entity-index-keyed `RemapList`.
    fn remap(&mut self, world: &World, changed: &[EntityId], max_index: u32);

    /// Per-tick update. `commands` defers every mutation to replay at the
    /// end of the frame.
    fn update(&mut self, world: &World, commands: &Commands<'_>, dt: f32);
}

/// Opaque identifier for a registered process, returned by
/// `World::register_process` and accepted by `World::unregister_process`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProcessId(u64);

fn next_process_id() -> ProcessId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    ProcessId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

struct Slot {
    id: ProcessId,
    process: Weak<Mutex<dyn Process>>,
}

/// Holds weak references to registered processes; strong ownership stays
/// with the caller (processes register on construction and should
/// `World::unregister_process` on teardown — see `DESIGN.md` for why this
/// crate uses an explicit unregister call rather than a `Drop`-triggered
/// one).
#[derive(Default)]
pub struct ProcessRegistry {
    /// Never driven yet; their first `remap` gets the full active list.
    pending: Vec<Slot>,
    /// Already remapped at least once; driven in registration order.
    active: Vec<Slot>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ProcessRegistry { pending: Vec::new(), active: Vec::new() }
    }

    /// Registers a process as pending; its first `remap` gets the full
    /// active list.
    pub fn register(&mut self, process: Arc<Mutex<dyn Process>>) -> ProcessId {
        let id = next_process_id();
        self.pending.push(Slot { id, process: Arc::downgrade(&process) });
        id
    }

    /// Removes a process from both the pending and active queues.
    pub fn unregister(&mut self, id: ProcessId) {
        self.pending.retain(|s| s.id != id);
        self.active.retain(|s| s.id != id);
    }

    /// `true` if any process is still awaiting its first remap.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drains `pending`, handing each a full-active-list remap, and moves
    /// it into `active`.
    pub fn promote_pending(&mut self, world: &World, ordered_active: &[EntityId], max_index: u32) {
        let pending = std::mem::take(&mut self.pending);
        for slot in pending {
            if let Some(p) = slot.process.upgrade() {
                p.lock().unwrap().remap(world, ordered_active, max_index);
                self.active.push(slot);
            }
            // Else: the process was dropped between registering and the
            // first tick; silently drop the dead slot.
        }
    }

    /// Drops any active slot whose process has been dropped, then delivers
    /// `changed` to every remaining active process's `remap`.
    pub fn remap_active(&mut self, world: &World, changed: &[EntityId], max_index: u32) {
        self.active.retain(|slot| slot.process.upgrade().is_some());
        for slot in &self.active {
            if let Some(p) = slot.process.upgrade() {
                p.lock().unwrap().remap(world, changed, max_index);
            }
        }
    }

    /// Drives every active process's `update(dt)`, in registration order.
    pub fn update_active(&mut self, world: &World, commands: &Commands<'_>, dt: f32) {
        for slot in &self.active {
            if let Some(p) = slot.process.upgrade() {
                p.lock().unwrap().update(world, commands, dt);
            }
        }
    }
}
