use crate::index::ShardedHashIndex;
use crate::sketch::{Sketch, SketchId};

use csv::WriterBuilder;
use serde::Serialize;

use std::error::Error;
use std::path::Path;

/// One reference ranked against the query. Rows serialize straight into the
/// output CSV, header from the field names.
#[derive(Debug, PartialEq, Serialize)]
pub struct PrefetchRecord {
    pub ref_id: SketchId,
    pub num_intersections: u64,
    pub containment_query_in_ref: f64,
    pub containment_ref_in_query: f64,
    pub jaccard: f64,
}

/// Per-reference overlap counters for one query: one index probe per query
/// hash, one increment per reference holding it. Gather seeds its residual
/// counters with exactly this.
pub fn overlap_counters(
    query: &Sketch,
    num_refs: usize,
    index: &ShardedHashIndex,
) -> Vec<u64> {
    let mut counters = vec![0u64; num_refs];
    for &hash in query.hashes.iter() {
        index.for_each_sketch(hash, |ref_id| counters[ref_id] += 1);
    }
    counters
}

/// Rank references by overlap with the query. References with fewer than
/// `threshold_bp` shared hashes are dropped, as are empty references and
/// pairs whose jaccard denominator is zero. Sorted by overlap descending;
/// ties broken by ref_id ascending.
pub fn prefetch(
    query: &Sketch,
    refs: &[Sketch],
    index: &ShardedHashIndex,
    threshold_bp: u64,
) -> Vec<PrefetchRecord> {
    if query.is_empty() {
        return Vec::new();
    }
    let counters = overlap_counters(query, refs.len(), index);
    let mut ranked: Vec<(SketchId, u64)> = counters.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .filter(|&(ref_id, count)| {
            count >= threshold_bp
                && !refs[ref_id].is_empty()
                && query.size() + refs[ref_id].size() != count as usize
        })
        .map(|(ref_id, count)| {
            let query_size = query.size() as f64;
            let ref_size = refs[ref_id].size() as f64;
            let denominator = query_size + ref_size - count as f64;
            PrefetchRecord {
                ref_id,
                num_intersections: count,
                containment_query_in_ref: count as f64 / query_size,
                containment_ref_in_query: count as f64 / ref_size,
                jaccard: count as f64 / denominator,
            }
        })
        .collect()
}

pub fn write_prefetch_csv<P: AsRef<Path>>(
    records: &[PrefetchRecord],
    output: P,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WriterBuilder::new().from_path(output)?;
    for record in records.iter() {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
