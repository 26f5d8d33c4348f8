use crate::index::ShardedHashIndex;
use crate::sketch::Sketch;

use std::io::{self, Write};
use std::thread;

/// Populate `index` so that every (sketch i, hash h) pair in `sketches` maps
/// h → i, inserting each pair exactly once. The sketch-id range is split
/// into one contiguous chunk per worker; per-shard locking inside the index
/// is the only coordination, so the final contents are a function of the
/// input alone, not of scheduling.
pub fn build_index(sketches: &[Sketch], index: &ShardedHashIndex, num_threads: usize) {
    let num_threads = num_threads.max(1);
    let num_sketches = sketches.len();
    let chunk_size = num_sketches / num_threads;
    thread::scope(|scope| {
        for worker in 0..num_threads {
            let start = worker * chunk_size;
            let end = if worker == num_threads - 1 {
                num_sketches
            } else {
                (worker + 1) * chunk_size
            };
            // the last worker doubles as the progress reporter
            let show_progress = worker == num_threads - 1;
            scope.spawn(move || index_chunk(sketches, index, start, end, show_progress));
        }
    });
}

fn index_chunk(
    sketches: &[Sketch],
    index: &ShardedHashIndex,
    start: usize,
    end: usize,
    show_progress: bool,
) {
    for i in start..end {
        if show_progress {
            let percentage = 100.0 * (i - start) as f64 / (end - start) as f64;
            print!("\rIndexing progress: {:.2}%", percentage);
            io::stdout().flush().ok();
        }
        for &hash in sketches[i].hashes.iter() {
            index.add(hash, i);
        }
    }
    if show_progress && end > start {
        println!("\rIndexing progress: 100.00%");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DEFAULT_NUM_SHARDS;
    use rand::prelude::*;

    fn test_corpus(num_sketches: usize) -> Vec<Sketch> {
        let mut rng = StdRng::seed_from_u64(0x5ee7);
        (0..num_sketches)
            .map(|i| {
                let size = rng.gen_range(0..200);
                let hashes = (0..size).map(|_| rng.gen::<u64>() % 4096).collect();
                Sketch::new(
                    hashes,
                    format!("/sketches/{}.sig", i),
                    format!("sketch-{}", i),
                    String::new(),
                    31,
                    u64::MAX,
                    42,
                )
            })
            .collect()
    }

    #[test]
    fn test_every_hash_maps_to_its_sketch() {
        let sketches = test_corpus(20);
        let index = ShardedHashIndex::new(64);
        build_index(&sketches, &index, 3);
        for (i, sketch) in sketches.iter().enumerate() {
            for &hash in sketch.hashes.iter() {
                assert!(index.get(hash).contains(&i));
            }
        }
    }

    #[test]
    fn test_absent_hash_not_indexed() {
        let sketches = vec![Sketch::new(
            vec![1, 2, 3],
            "a.sig".into(),
            "a".into(),
            String::new(),
            31,
            u64::MAX,
            42,
        )];
        let index = ShardedHashIndex::new(DEFAULT_NUM_SHARDS);
        build_index(&sketches, &index, 2);
        assert!(!index.contains(4));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_build_is_thread_count_independent() {
        let sketches = test_corpus(50);
        let serial = ShardedHashIndex::new(128);
        build_index(&sketches, &serial, 1);
        let parallel = ShardedHashIndex::new(128);
        build_index(&sketches, &parallel, 8);

        assert_eq!(serial.len(), parallel.len());
        for sketch in sketches.iter() {
            for &hash in sketch.hashes.iter() {
                let mut expected = serial.get(hash);
                let mut actual = parallel.get(hash);
                expected.sort_unstable();
                actual.sort_unstable();
                assert_eq!(expected, actual);
            }
        }
    }

    #[test]
    fn test_more_threads_than_sketches() {
        let sketches = test_corpus(3);
        let index = ShardedHashIndex::new(32);
        build_index(&sketches, &index, 16);
        let serial = ShardedHashIndex::new(32);
        build_index(&sketches, &serial, 1);
        assert_eq!(index.len(), serial.len());
    }

    #[test]
    fn test_empty_corpus() {
        let sketches: Vec<Sketch> = Vec::new();
        let index = ShardedHashIndex::new(8);
        build_index(&sketches, &index, 4);
        assert!(index.is_empty());
    }

    #[test]
    fn test_empty_sketch_contributes_nothing() {
        let sketches = vec![
            Sketch::empty("gone.sig".to_string()),
            Sketch::new(
                vec![9],
                "b.sig".into(),
                "b".into(),
                String::new(),
                31,
                u64::MAX,
                42,
            ),
        ];
        let index = ShardedHashIndex::new(8);
        build_index(&sketches, &index, 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(9), vec![1]);
    }
}
