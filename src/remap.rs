//! The fold/reorder step of the remap pipeline: a stable radix fold of a
//! key-tagged, entity-index-keyed list into a dense, key-ordered working
//! set sliced into buckets.

use crate::entity::EntityId;

/// Key value meaning "exclude this entity index from the fold".
pub const EXCLUDED_KEY: u8 = 0xFF;

/// Number of distinct, includable key values (`0..=254`).
const KEY_SPACE: usize = 255;

/// A sparse, entity-index-keyed table: `list[e] == (key, id)` for the
/// entity at index `e`. A process rebuilds this (only for changed indices,
/// reusing the same allocation across frames) before each `fold_and_reorder`
/// call. `key == EXCLUDED_KEY` means "this entity doesn't match, leave out
/// of the fold".
pub type RemapList = Vec<(u8, EntityId)>;

/// A contiguous `[from, to_inclusive]` range into a folded working set,
/// naming every entity sharing one key. Buckets appear in ascending key
/// order; the core guarantees bucket *k* is logically "before" bucket
/// *k+1* (a process may parallelize within a bucket but must not run
/// bucket *k+1* concurrently with bucket *k* if it relies on that
/// ordering).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Index of the first entity in this bucket.
    pub from: usize,
    /// Index of the last entity in this bucket (inclusive).
    pub to_inclusive: usize,
}

impl Bucket {
    /// The half-open `[from, to_inclusive + 1)` range, handy for slicing.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.from..self.to_inclusive + 1
    }
}

/// Builds a histogram over `input`'s keys, converts it to prefix offsets,
/// and walks `input` left-to-right placing each included id at its key's
/// next offset — a stable counting sort. `out` is resized to the included
/// count; `buckets` is cleared and refilled with one entry per nonzero-count
/// key in ascending order.
///
/// Complexity: O(`input.len()` + 255).
///
/// Stability: two tuples sharing a key appear in `out` in the same relative
/// order they had in `input`, because the per-key cursor only advances.
pub fn fold_and_reorder(input: &[(u8, EntityId)], out: &mut Vec<EntityId>, buckets: &mut Vec<Bucket>) {
    log::debug!("fold_and_reorder: folding {} tuples", input.len());
    let mut histogram = [0usize; KEY_SPACE];
    for &(key, _) in input {
        if key != EXCLUDED_KEY {
            histogram[key as usize] += 1;
        }
    }

    let mut cursors = [0usize; KEY_SPACE];
    buckets.clear();
    let mut running = 0usize;
    for (key, &count) in histogram.iter().enumerate() {
        cursors[key] = running;
        if count > 0 {
            buckets.push(Bucket { from: running, to_inclusive: running + count - 1 });
        }
        running += count;
    }

    out.clear();
    out.resize(running, EntityId::INVALID);
    for &(key, id) in input {
        if key == EXCLUDED_KEY {
            continue;
        }
        let slot = cursors[key as usize];
        out[slot] = id;
        cursors[key as usize] += 1;
    }
    log::debug!("fold_and_reorder: {} buckets, {} entities folded", buckets.len(), out.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::IdGenerator;

    #[test]
    fn excludes_0xff_and_counts_buckets() {
        let mut gen = IdGenerator::new();
        let mut input = Vec::new();
        for key in 0u8..=3 {
            for _ in 0..4 {
                input.push((key, gen.acquire()));
            }
        }
        input.push((EXCLUDED_KEY, gen.acquire()));

        let mut out = Vec::new();
        let mut buckets = Vec::new();
        fold_and_reorder(&input, &mut out, &mut buckets);

        assert_eq!(out.len(), 16);
        assert_eq!(buckets.len(), 4);
        for (k, b) in buckets.iter().enumerate() {
            assert_eq!(b.from, k * 4);
            assert_eq!(b.to_inclusive, k * 4 + 3);
        }
    }

    #[test]
    fn stable_within_key() {
        let mut gen = IdGenerator::new();
        let ids: Vec<EntityId> = (0..10).map(|_| gen.acquire()).collect();
        // all share key 0, in a specific order
        let input: Vec<(u8, EntityId)> = ids.iter().map(|&id| (0u8, id)).collect();
        let mut out = Vec::new();
        let mut buckets = Vec::new();
        fold_and_reorder(&input, &mut out, &mut buckets);
        assert_eq!(out, ids);
        assert_eq!(buckets, vec![Bucket { from: 0, to_inclusive: 9 }]);
    }

    #[test]
    fn descending_key_scenario() {
        // 100 tuples per key, keys 256 down to 0 (0xFF excluded by value range
        // anyway since key is u8 0..=255; emulate by looping 255 down to 0).
        let mut gen = IdGenerator::new();
        let mut input = Vec::new();
        for key in (0u8..=254).rev() {
            for _ in 0..3 {
                input.push((key, gen.acquire()));
            }
        }
        let mut out = Vec::new();
        let mut buckets = Vec::new();
        fold_and_reorder(&input, &mut out, &mut buckets);
        assert_eq!(buckets.len(), 255);
        assert_eq!(out.len(), 255 * 3);
        // bucket order is ascending by key regardless of input order
        for (k, b) in buckets.iter().enumerate() {
            assert_eq!(b.from, k * 3);
        }
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let mut out = Vec::new();
        let mut buckets = Vec::new();
        fold_and_reorder(&[], &mut out, &mut buckets);
        assert!(out.is_empty());
        assert!(buckets.is_empty());
    }

    #[test]
    fn random_keys_fold_to_a_stable_sort_by_key() {
        use rand::Rng;

        let mut gen = IdGenerator::new();
        let mut rng = rand::thread_rng();
        let input: Vec<(u8, EntityId)> = (0..2000)
            .map(|_| {
                let key = if rng.gen_bool(0.1) { EXCLUDED_KEY } else { rng.gen_range(0..=254) };
                (key, gen.acquire())
            })
            .collect();

        let mut out = Vec::new();
        let mut buckets = Vec::new();
        fold_and_reorder(&input, &mut out, &mut buckets);

        let mut expected: Vec<(u8, EntityId)> =
            input.iter().copied().filter(|&(key, _)| key != EXCLUDED_KEY).collect();
        expected.sort_by_key(|&(key, _)| key); // Vec::sort_by_key is stable
        let expected_ids: Vec<EntityId> = expected.into_iter().map(|(_, id)| id).collect();

        assert_eq!(out, expected_ids);
        for w in buckets.windows(2) {
            assert!(w[0].to_inclusive < w[1].from);
        }
    }
}
