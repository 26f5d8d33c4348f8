use crate::index::ShardedHashIndex;
use crate::sketch::{Sketch, SketchId};

use csv::WriterBuilder;
use serde::Serialize;

use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

/// Header row written once, during concatenation. The tile files themselves
/// are headerless so they can be appended verbatim.
pub const PAIRWISE_HEADER: &str = "query_id,query_name,query_md5,ref_id,ref_name,ref_md5,jaccard,containment_query_in_ref,containment_ref_in_query";

#[derive(Debug, Serialize)]
struct PairwiseRecord<'a> {
    query_id: SketchId,
    query_name: &'a str,
    query_md5: &'a str,
    ref_id: SketchId,
    ref_name: &'a str,
    ref_md5: &'a str,
    jaccard: f64,
    containment_query_in_ref: f64,
    containment_ref_in_query: f64,
}

/// Tile file for one (pass, thread) pair: `{out_dir}/{pass}_{thread:03}.txt`.
pub fn tile_path(out_dir: &Path, pass_id: usize, thread_id: usize) -> PathBuf {
    out_dir.join(format!("{}_{:03}.txt", pass_id, thread_id))
}

/// Compute the query×reference intersection matrix in `num_passes` slabs of
/// query rows, bounding peak memory at `ceil(|Q|/P) × |R|` counters. Within
/// a pass, contiguous row ranges go to `num_threads` workers; each worker
/// owns a disjoint slab of the shared tile, so the compute phase needs no
/// locking, and writes its own tile file, so the write phase shares nothing.
/// The index is only read.
///
/// Pairs are emitted when the intersection is non-zero, both sketches are
/// non-empty, the jaccard denominator is non-zero, and the containment of
/// the query row in the reference reaches `containment_threshold`.
pub fn compute_pairwise(
    queries: &[Sketch],
    refs: &[Sketch],
    index: &ShardedHashIndex,
    out_dir: &Path,
    containment_threshold: f64,
    num_passes: usize,
    num_threads: usize,
) -> Result<(), Box<dyn Error>> {
    let num_passes = num_passes.max(1);
    let num_threads = num_threads.max(1);
    let num_queries = queries.len();
    let num_refs = refs.len();
    let stride = (num_queries + num_passes - 1) / num_passes;

    // one tile, re-zeroed per pass
    let mut tile = vec![0u32; stride * num_refs];

    for pass_id in 0..num_passes {
        for cell in tile.iter_mut() {
            *cell = 0;
        }
        let q_lo = (pass_id * stride).min(num_queries);
        let q_hi = ((pass_id + 1) * stride).min(num_queries);
        let rows_this_pass = q_hi - q_lo;
        let chunk_size = rows_this_pass / num_threads;

        thread::scope(|scope| -> Result<(), csv::Error> {
            let mut handles = Vec::with_capacity(num_threads);
            let mut remaining = &mut tile[..rows_this_pass * num_refs];
            for thread_id in 0..num_threads {
                let row_lo = thread_id * chunk_size;
                let row_hi = if thread_id == num_threads - 1 {
                    rows_this_pass
                } else {
                    (thread_id + 1) * chunk_size
                };
                let (slab, rest) =
                    std::mem::take(&mut remaining).split_at_mut((row_hi - row_lo) * num_refs);
                remaining = rest;
                let output = tile_path(out_dir, pass_id, thread_id);
                handles.push(scope.spawn(move || {
                    pairwise_worker(
                        slab,
                        q_lo + row_lo,
                        row_hi - row_lo,
                        queries,
                        refs,
                        index,
                        containment_threshold,
                        &output,
                    )
                }));
            }
            for handle in handles {
                handle.join().expect("pairwise worker panicked")?;
            }
            Ok(())
        })?;

        println!("Pass {}/{} done.", pass_id + 1, num_passes);
    }
    Ok(())
}

/// One worker: fill the counters for its rows, then emit its rows to its own
/// tile file. `slab` holds `num_rows` rows of `refs.len()` counters and
/// `query_start` is the global id of the first row.
fn pairwise_worker(
    slab: &mut [u32],
    query_start: usize,
    num_rows: usize,
    queries: &[Sketch],
    refs: &[Sketch],
    index: &ShardedHashIndex,
    containment_threshold: f64,
    output: &Path,
) -> Result<(), csv::Error> {
    let num_refs = refs.len();
    for row in 0..num_rows {
        let counters = &mut slab[row * num_refs..(row + 1) * num_refs];
        for &hash in queries[query_start + row].hashes.iter() {
            index.for_each_sketch(hash, |ref_id| counters[ref_id] += 1);
        }
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_path(output)?;
    for row in 0..num_rows {
        let query_id = query_start + row;
        let query = &queries[query_id];
        for (ref_id, reference) in refs.iter().enumerate() {
            let count = slab[row * num_refs + ref_id];
            if count == 0 {
                continue;
            }
            if query.is_empty() || reference.is_empty() {
                continue;
            }
            let denominator = query.size() + reference.size() - count as usize;
            if denominator == 0 {
                continue;
            }
            let containment_query_in_ref = count as f64 / query.size() as f64;
            if containment_query_in_ref < containment_threshold {
                continue;
            }
            writer.serialize(PairwiseRecord {
                query_id,
                query_name: &query.name,
                query_md5: &query.md5,
                ref_id,
                ref_name: &reference.name,
                ref_md5: &reference.md5,
                jaccard: count as f64 / denominator as f64,
                containment_query_in_ref,
                containment_ref_in_query: count as f64 / reference.size() as f64,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Stitch the per-(pass, thread) tile files into the final output, header
/// first, in (pass, thread) order. The tile files are left in place.
pub fn concatenate_pass_files(
    out_dir: &Path,
    num_passes: usize,
    num_threads: usize,
    output: &Path,
) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(output)?);
    writeln!(writer, "{}", PAIRWISE_HEADER)?;
    for pass_id in 0..num_passes.max(1) {
        for thread_id in 0..num_threads.max(1) {
            let mut tile_file = File::open(tile_path(out_dir, pass_id, thread_id))?;
            io::copy(&mut tile_file, &mut writer)?;
        }
    }
    writer.flush()
}
