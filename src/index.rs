use crate::sketch::{HashValue, SketchId};

use std::collections::HashMap;
use std::sync::Mutex;

/// Default shard count. MinHash values are uniform, so `hash % N` spreads
/// keys evenly; contention scales with threads²/N, so keep N well above
/// 16× the worker count.
pub const DEFAULT_NUM_SHARDS: usize = 4096;

/// Inverted index from hash value to the sketches containing it, split into
/// independently locked shards so index construction can mutate from many
/// threads at once. Shard selection is `hash % num_shards`, so any given
/// hash lives in exactly one shard.
///
/// The id list for a hash is an insertion-ordered multiset: callers must not
/// rely on the order, and must not insert the same (hash, sketch) pair twice
/// (`add` does not deduplicate). An emptied list is erased together with its
/// key rather than left behind.
pub struct ShardedHashIndex {
    shards: Vec<Mutex<HashMap<HashValue, Vec<SketchId>>>>,
}

impl ShardedHashIndex {
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards > 0, "index must have at least one shard");
        let mut shards = Vec::with_capacity(num_shards);
        for _ in 0..num_shards {
            shards.push(Mutex::new(HashMap::new()));
        }
        ShardedHashIndex { shards }
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, hash: HashValue) -> &Mutex<HashMap<HashValue, Vec<SketchId>>> {
        &self.shards[(hash % self.shards.len() as u64) as usize]
    }

    /// Append `sketch_id` to the list at `hash`, creating the list if the
    /// hash is new. The caller guarantees the (hash, sketch) pair is added
    /// at most once.
    pub fn add(&self, hash: HashValue, sketch_id: SketchId) {
        let mut shard = self.shard(hash).lock().unwrap();
        shard.entry(hash).or_insert_with(Vec::new).push(sketch_id);
    }

    /// Replace the list at `hash` wholesale. Bulk-load entry point; the core
    /// engines never call it.
    pub fn add_many(&self, hash: HashValue, sketch_ids: Vec<SketchId>) {
        let mut shard = self.shard(hash).lock().unwrap();
        shard.insert(hash, sketch_ids);
    }

    /// Snapshot of the id list at `hash`, empty if absent. The copy is what
    /// lets gather keep a result across later `remove_all` calls on the
    /// same shard.
    pub fn get(&self, hash: HashValue) -> Vec<SketchId> {
        let shard = self.shard(hash).lock().unwrap();
        match shard.get(&hash) {
            Some(sketch_ids) => sketch_ids.clone(),
            None => Vec::new(),
        }
    }

    /// Visit each sketch id at `hash` under the shard lock, without copying
    /// the list. Read-only counterpart of `get` for the counter-accumulation
    /// loops in prefetch and pairwise, which probe once per query hash.
    pub fn for_each_sketch<F>(&self, hash: HashValue, mut f: F)
    where
        F: FnMut(SketchId),
    {
        let shard = self.shard(hash).lock().unwrap();
        if let Some(sketch_ids) = shard.get(&hash) {
            for &sketch_id in sketch_ids.iter() {
                f(sketch_id);
            }
        }
    }

    /// Erase the first occurrence of `sketch_id` from the list at `hash`;
    /// erase the key once the list is empty. Absent hash or absent id is a
    /// no-op.
    pub fn remove(&self, hash: HashValue, sketch_id: SketchId) {
        let mut shard = self.shard(hash).lock().unwrap();
        if let Some(sketch_ids) = shard.get_mut(&hash) {
            if let Some(position) = sketch_ids.iter().position(|&id| id == sketch_id) {
                sketch_ids.remove(position);
            }
            if sketch_ids.is_empty() {
                shard.remove(&hash);
            }
        }
    }

    /// Retire a hash entirely: erase the key and hand back every sketch id
    /// that held it. Gather uses this to retire each hash of the selected
    /// reference in one shot.
    pub fn remove_all(&self, hash: HashValue) -> Vec<SketchId> {
        let mut shard = self.shard(hash).lock().unwrap();
        shard.remove(&hash).unwrap_or_default()
    }

    pub fn contains(&self, hash: HashValue) -> bool {
        let shard = self.shard(hash).lock().unwrap();
        shard.contains_key(&hash)
    }

    /// Number of distinct hashes across all shards. Not atomic with respect
    /// to concurrent mutation.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sketches A={1,2,3}, B={2,3,4}, C={5} as ids 0, 1, 2
    fn s1_index() -> ShardedHashIndex {
        let index = ShardedHashIndex::new(16);
        for &hash in &[1u64, 2, 3] {
            index.add(hash, 0);
        }
        for &hash in &[2u64, 3, 4] {
            index.add(hash, 1);
        }
        index.add(5, 2);
        index
    }

    #[test]
    fn test_add_and_get() {
        let index = s1_index();
        assert_eq!(index.get(1), vec![0]);
        let mut ids = index.get(2);
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(index.get(5), vec![2]);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_get_missing_is_empty() {
        let index = s1_index();
        assert!(index.get(6).is_empty());
        assert!(!index.contains(6));
        assert!(index.contains(4));
    }

    #[test]
    fn test_for_each_sketch_matches_get() {
        let index = s1_index();
        let mut seen = Vec::new();
        index.for_each_sketch(3, |id| seen.push(id));
        let mut snapshot = index.get(3);
        snapshot.sort_unstable();
        seen.sort_unstable();
        assert_eq!(seen, snapshot);
    }

    #[test]
    fn test_remove_erases_first_occurrence() {
        let index = s1_index();
        index.remove(2, 0);
        assert_eq!(index.get(2), vec![1]);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_remove_last_id_erases_key() {
        let index = s1_index();
        index.remove(1, 0);
        assert!(!index.contains(1));
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_remove_absent_id_is_noop() {
        let index = s1_index();
        index.remove(1, 7);
        assert_eq!(index.get(1), vec![0]);
        index.remove(99, 0);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_remove_all() {
        let index = s1_index();
        let mut removed = index.remove_all(3);
        removed.sort_unstable();
        assert_eq!(removed, vec![0, 1]);
        assert!(!index.contains(3));
        assert!(index.get(3).is_empty());
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_remove_all_missing() {
        let index = s1_index();
        assert!(index.remove_all(77).is_empty());
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_add_many_overwrites() {
        let index = s1_index();
        index.add_many(2, vec![7, 8, 9]);
        assert_eq!(index.get(2), vec![7, 8, 9]);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_single_shard_index() {
        let index = ShardedHashIndex::new(1);
        index.add(10, 0);
        index.add(11, 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(10), vec![0]);
    }

    #[test]
    #[should_panic]
    fn test_zero_shards_panics() {
        ShardedHashIndex::new(0);
    }
}
