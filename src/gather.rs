use crate::index::ShardedHashIndex;
use crate::prefetch::overlap_counters;
use crate::sketch::{HashValue, Sketch, SketchId};

use csv::WriterBuilder;
use serde::Serialize;

use std::collections::HashSet;
use std::error::Error;
use std::path::Path;

/// One greedy selection: the reference, its residual overlap at the moment
/// it was picked, its overlap before any subtraction, and the fraction of
/// the original query it uniquely covers. Rows serialize in selection order.
#[derive(Debug, PartialEq, Serialize)]
pub struct GatherRecord {
    pub ref_id: SketchId,
    pub num_overlap: u64,
    pub num_overlap_orig: u64,
    pub name: String,
    pub md5: String,
    pub f_unique_to_query: f64,
}

/// Greedy set cover of the query against the indexed references.
///
/// Repeatedly selects the reference with the largest residual overlap
/// (smallest id on ties), then retires every hash of that reference from the
/// index with `remove_all`, decrementing the residual counter of each
/// returned reference when the hash is still an alive query hash. Residual
/// counters therefore always equal the number of alive query hashes a
/// reference still holds in the index. Stops once the best residual falls
/// below `threshold_bp`, or reaches zero.
///
/// The index is consumed in place; sketches themselves are never mutated.
/// Runs single-threaded after index build, so selection order is a function
/// of the inputs only.
pub fn gather(
    query: &Sketch,
    refs: &[Sketch],
    index: &ShardedHashIndex,
    threshold_bp: u64,
) -> Vec<GatherRecord> {
    let mut residual_overlap = overlap_counters(query, refs.len(), index);
    let original_overlap = residual_overlap.clone();
    let mut query_alive: HashSet<HashValue> = query.hashes.iter().copied().collect();
    let query_size = query.size();

    let mut records = Vec::new();
    loop {
        let mut best_id = 0;
        let mut best_overlap = 0;
        for (ref_id, &overlap) in residual_overlap.iter().enumerate() {
            if overlap > best_overlap {
                best_id = ref_id;
                best_overlap = overlap;
            }
        }
        if best_overlap == 0 || best_overlap < threshold_bp {
            break;
        }

        records.push(GatherRecord {
            ref_id: best_id,
            num_overlap: best_overlap,
            num_overlap_orig: original_overlap[best_id],
            name: refs[best_id].name.clone(),
            md5: refs[best_id].md5.clone(),
            f_unique_to_query: best_overlap as f64 / query_size as f64,
        });

        // Retire every hash of the selected reference. Each reference that
        // counted an alive query hash loses exactly one from its residual,
        // the selected one included, which is what drives it to zero.
        for &hash in refs[best_id].hashes.iter() {
            let removed = index.remove_all(hash);
            if query_alive.remove(&hash) {
                for ref_id in removed {
                    assert!(
                        residual_overlap[ref_id] > 0,
                        "residual overlap underflow for reference {}",
                        ref_id
                    );
                    residual_overlap[ref_id] -= 1;
                }
            }
        }
    }
    records
}

pub fn write_gather_csv<P: AsRef<Path>>(
    records: &[GatherRecord],
    output: P,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WriterBuilder::new().from_path(output)?;
    for record in records.iter() {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_index;
    use float_cmp::approx_eq;

    fn sketch(name: &str, hashes: &[u64]) -> Sketch {
        Sketch::new(
            hashes.to_vec(),
            format!("{}.sig", name),
            name.to_string(),
            format!("md5-{}", name),
            31,
            u64::MAX,
            42,
        )
    }

    fn s3_setup() -> (Sketch, Vec<Sketch>, ShardedHashIndex) {
        let refs = vec![
            sketch("A", &[1, 2, 3]),
            sketch("B", &[2, 3, 4]),
            sketch("C", &[5]),
        ];
        let index = ShardedHashIndex::new(16);
        build_index(&refs, &index, 1);
        (sketch("Q", &[1, 2, 3, 4]), refs, index)
    }

    #[test]
    fn test_gather_greedy_cover() {
        let (query, refs, index) = s3_setup();
        let records = gather(&query, &refs, &index, 1);
        assert_eq!(records.len(), 2);

        // A wins the first round on the id tie-break against B
        assert_eq!(records[0].ref_id, 0);
        assert_eq!(records[0].num_overlap, 3);
        assert_eq!(records[0].num_overlap_orig, 3);
        assert_eq!(records[0].name, "A");
        assert!(approx_eq!(f64, records[0].f_unique_to_query, 0.75));

        // after subtracting A only hash 4 of B is left
        assert_eq!(records[1].ref_id, 1);
        assert_eq!(records[1].num_overlap, 1);
        assert_eq!(records[1].num_overlap_orig, 3);
        assert!(approx_eq!(f64, records[1].f_unique_to_query, 0.25));
    }

    #[test]
    fn test_gather_retires_selected_hashes() {
        let (query, refs, index) = s3_setup();
        gather(&query, &refs, &index, 1);
        for hash in 1..=4u64 {
            assert!(!index.contains(hash));
        }
        // C was never selected, so its hash survives
        assert!(index.contains(5));
    }

    #[test]
    fn test_gather_threshold_stops_selection() {
        let (query, refs, index) = s3_setup();
        let records = gather(&query, &refs, &index, 2);
        // B's residual after A is 1, below the threshold
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ref_id, 0);
    }

    #[test]
    fn test_gather_disjoint_query_stops_immediately() {
        let (_, refs, index) = s3_setup();
        let query = sketch("Q", &[100, 101]);
        let records = gather(&query, &refs, &index, 1);
        assert!(records.is_empty());
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_gather_fully_contained_query() {
        let refs = vec![sketch("A", &[1, 2, 3, 4]), sketch("B", &[3, 4])];
        let index = ShardedHashIndex::new(8);
        build_index(&refs, &index, 1);
        let query = sketch("Q", &[1, 2, 3]);
        let records = gather(&query, &refs, &index, 1);
        // A covers the whole query in iteration one and B's residual
        // drops to zero along with it
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ref_id, 0);
        assert_eq!(records[0].num_overlap, 3);
        assert!(approx_eq!(f64, records[0].f_unique_to_query, 1.0));
    }

    #[test]
    fn test_gather_zero_threshold_terminates() {
        let (query, refs, index) = s3_setup();
        let records = gather(&query, &refs, &index, 0);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_gather_empty_query() {
        let (_, refs, index) = s3_setup();
        let query = Sketch::empty("q.sig".into());
        assert!(gather(&query, &refs, &index, 1).is_empty());
    }

    #[test]
    fn test_write_gather_csv() {
        let (query, refs, index) = s3_setup();
        let records = gather(&query, &refs, &index, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gather.csv");
        write_gather_csv(&records, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ref_id,num_overlap,num_overlap_orig,name,md5,f_unique_to_query"
        );
        assert_eq!(lines.count(), 2);
    }
}
