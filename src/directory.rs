//! The entity directory: per-entity records, per-entity component masks,
//! and the two active-entity views (append order and index order).

use crate::bitmask::BitMask;
use crate::entity::EntityId;

/// Per-slot record. Kept under 64 bytes so it fits a cache line; in
/// practice it is two words.
#[derive(Clone, Copy)]
struct EntityRecord {
    id: EntityId,
    active_position: u32,
}

const _: () = assert!(std::mem::size_of::<EntityRecord>() <= 64);

/// Owns entity records, per-entity bitmasks, and the two active-entity
/// views. Mutated only from `World`'s MUTABLE-phase methods and during
/// dispatcher replay — i.e. only ever from code holding `&mut World`.
#[derive(Default)]
pub struct EntityDirectory {
    records: Vec<EntityRecord>,
    masks: Vec<BitMask>,
    unordered: Vec<EntityId>,
    ordered: Vec<EntityId>,
    ordered_dirty: bool,
}

impl EntityDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        EntityDirectory {
            records: Vec::new(),
            masks: Vec::new(),
            unordered: Vec::new(),
            ordered: Vec::new(),
            ordered_dirty: false,
        }
    }

    /// One past the highest entity index ever assigned a slot; the
    /// `max_index` passed to `Process::remap`.
    pub fn max_index(&self) -> u32 {
        self.records.len() as u32
    }

    /// `true` if `id` names a currently-live entity (the stored record for
    /// its index matches it bit-for-bit).
    pub fn is_valid(&self, id: EntityId) -> bool {
        if id.is_invalid() {
            return false;
        }
        match self.records.get(id.index() as usize) {
            Some(rec) => rec.id == id,
            None => false,
        }
    }

    /// The component bitmask for `id`, or `None` if it isn't live.
    pub fn mask_of(&self, id: EntityId) -> Option<&BitMask> {
        if !self.is_valid(id) {
            return None;
        }
        self.masks.get(id.index() as usize)
    }

    fn mask_of_mut(&mut self, id: EntityId) -> &mut BitMask {
        &mut self.masks[id.index() as usize]
    }

    /// Materializes the directory slot for a freshly-allocated `id`
    /// (reused or brand new) and appends it to the active lists.
    pub fn install(&mut self, id: EntityId) {
        let idx = id.index() as usize;
        let append_position = self.unordered.len() as u32;
        if idx < self.records.len() {
            self.records[idx] = EntityRecord { id, active_position: append_position };
            self.masks[idx].clear();
            // A reused index is not necessarily greater than `ordered`'s
            // current tail (it was freed by an earlier destroy further
            // back in index order), so appending here could break
            // ascending order. Mark dirty instead of pushing.
            self.ordered_dirty = true;
        } else {
            debug_assert_eq!(idx, self.records.len(), "id generator and directory are out of sync");
            self.records.push(EntityRecord { id, active_position: append_position });
            self.masks.push(BitMask::new());
            if !self.ordered_dirty {
                // Fresh indices are monotone increasing at the moment
                // they're installed, so appending keeps `ordered` sorted
                // for free.
                self.ordered.push(id);
            }
        }
        self.unordered.push(id);
    }

    /// Tears down a live entity's directory bookkeeping: invalidates its
    /// record, swap-removes it from the unordered active list (fixing up
    /// the moved entity's `active_position`), and marks `ordered` dirty.
    /// Does not touch component storages; the caller erases those first
    /// using the mask this returns.
    pub fn teardown(&mut self, id: EntityId) -> BitMask {
        let idx = id.index() as usize;
        debug_assert!(self.is_valid(id), "teardown of invalid entity {:?}", id);
        let mask = self.masks[idx];
        let pos = self.records[idx].active_position as usize;
        self.records[idx].id = EntityId::INVALID;
        let last = self.unordered.len() - 1;
        self.unordered.swap_remove(pos);
        if pos != last {
            let moved = self.unordered[pos];
            self.records[moved.index() as usize].active_position = pos as u32;
        }
        self.ordered_dirty = true;
        mask
    }

    /// Like `teardown`, but skips fixing up `active_position` for the
    /// entity it swaps with — valid only when the caller is about to wipe
    /// `unordered`/`ordered` wholesale anyway (`destroy_all`'s fast path;
    /// see `World::destroy_all`).
    pub fn teardown_bulk(&mut self, id: EntityId) -> BitMask {
        let idx = id.index() as usize;
        let mask = self.masks[idx];
        self.records[idx].id = EntityId::INVALID;
        mask
    }

    /// Wipes every record, mask, and active-list view (the second half of
    /// `destroy_all`'s fast path, after every entity has been torn down).
    pub fn clear_all(&mut self) {
        self.records.clear();
        self.masks.clear();
        self.unordered.clear();
        self.ordered.clear();
        self.ordered_dirty = false;
    }

    /// Toggles bit `bit` of `id`'s component mask, asserting it currently
    /// reads `expect_prior` (the add/remove-component precondition check).
    pub fn flip_bit(&mut self, id: EntityId, bit: usize, expect_prior: bool) {
        let mask = self.mask_of_mut(id);
        debug_assert_eq!(mask.get(bit), expect_prior, "component bit precondition violated for {:?}", id);
        mask.flip(bit);
    }

    /// Append-order view of currently-active entities.
    pub fn unordered_active(&self) -> &[EntityId] {
        &self.unordered
    }

    /// Rebuilds the index-sorted view if it was marked dirty by a
    /// create/destroy since the last rebuild.
    pub fn rebuild_ordered_if_dirty(&mut self) {
        if self.ordered_dirty {
            self.ordered.clear();
            self.ordered.extend_from_slice(&self.unordered);
            self.ordered.sort_unstable_by_key(|id| id.index());
            self.ordered_dirty = false;
        }
    }

    /// Index-sorted view of currently-active entities. May be stale if
    /// read through a shared `&self` without an intervening
    /// `rebuild_ordered_if_dirty`; `World::update` rebuilds once per frame
    /// before handing processes a shared `&World`, and `World`'s own
    /// `&mut self` accessor rebuilds on every call.
    pub fn ordered_active(&self) -> &[EntityId] {
        &self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::IdGenerator;

    #[test]
    fn install_then_teardown_updates_active_lists() {
        let mut dir = EntityDirectory::new();
        let mut gen = IdGenerator::new();
        let a = gen.acquire();
        let b = gen.acquire();
        let c = gen.acquire();
        dir.install(a);
        dir.install(b);
        dir.install(c);
        assert!(dir.is_valid(a) && dir.is_valid(b) && dir.is_valid(c));
        dir.rebuild_ordered_if_dirty();
        assert_eq!(dir.ordered_active(), &[a, b, c]);

        dir.teardown(b);
        assert!(!dir.is_valid(b));
        assert!(dir.is_valid(a) && dir.is_valid(c));
        dir.rebuild_ordered_if_dirty();
        let ordered = dir.ordered_active().to_vec();
        assert_eq!(ordered, vec![a, c]);
    }

    #[test]
    fn reused_slot_after_rebuild_keeps_ordered_ascending() {
        let mut dir = EntityDirectory::new();
        let mut gen = IdGenerator::new();
        let e0 = gen.acquire();
        let e1 = gen.acquire();
        let e2 = gen.acquire();
        dir.install(e0);
        dir.install(e1);
        dir.install(e2);
        dir.rebuild_ordered_if_dirty();
        assert_eq!(dir.ordered_active(), &[e0, e1, e2]);

        dir.teardown(e1);
        gen.release(e1);
        dir.rebuild_ordered_if_dirty();
        assert_eq!(dir.ordered_active(), &[e0, e2]);

        let e3 = gen.acquire(); // reuses index 1
        assert_eq!(e3.index(), e1.index());
        dir.install(e3);
        dir.rebuild_ordered_if_dirty();
        let ordered = dir.ordered_active().to_vec();
        let mut sorted = ordered.clone();
        sorted.sort_unstable_by_key(|id| id.index());
        assert_eq!(ordered, sorted, "ordered must stay index-ascending after a reused-index install");
        assert_eq!(ordered, vec![e0, e3, e2]);
    }

    #[test]
    fn reused_slot_clears_mask() {
        let mut dir = EntityDirectory::new();
        let mut gen = IdGenerator::new();
        let a = gen.acquire();
        dir.install(a);
        dir.flip_bit(a, 3, false);
        assert!(dir.mask_of(a).unwrap().get(3));
        dir.teardown(a);
        gen.release(a);
        let a2 = gen.acquire();
        assert_eq!(a2.index(), a.index());
        dir.install(a2);
        assert!(!dir.mask_of(a2).unwrap().get(3));
    }
}
