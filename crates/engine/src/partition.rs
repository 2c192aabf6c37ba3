//! Batch partitioning and the depth bound of the reduction tree.

use sitemaster_core::Record;

use crate::error::EngineError;

/// Split records into contiguous batches of at most `max_size`, preserving
/// order. The last batch may be shorter.
pub fn partition(records: &[Record], max_size: usize) -> Result<Vec<&[Record]>, EngineError> {
    if max_size == 0 {
        return Err(EngineError::Config("batch size must be at least 1".into()));
    }
    Ok(records.chunks(max_size).collect())
}

/// Levels the tournament runs for `batch_count` master files:
/// `ceil((batch_count + 1) / 2)`. Levels past the point where one file is
/// left are pass-through and cost no scorer calls.
pub fn reduction_depth(batch_count: usize) -> usize {
    if batch_count == 0 {
        return 0;
    }
    (batch_count + 2) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemaster_core::{RecordId, SiteFields};

    fn records(n: u64) -> Vec<Record> {
        (1..=n)
            .map(|i| Record {
                id: RecordId(i),
                country: "USA".into(),
                fields: SiteFields::default(),
                display: SiteFields::default(),
                extra: Default::default(),
            })
            .collect()
    }

    #[test]
    fn partition_preserves_order_and_sizes() {
        let recs = records(5);
        let batches = partition(&recs, 2).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[2].len(), 1);
        let ids: Vec<u64> = batches.iter().flat_map(|b| b.iter().map(|r| r.id.0)).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn partition_exact_multiple() {
        let recs = records(6);
        let batches = partition(&recs, 3).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn partition_empty_input() {
        let batches = partition(&[], 10).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn partition_rejects_zero_size() {
        assert!(matches!(partition(&records(3), 0), Err(EngineError::Config(_))));
    }

    #[test]
    fn depth_bound() {
        assert_eq!(reduction_depth(0), 0);
        assert_eq!(reduction_depth(1), 1);
        assert_eq!(reduction_depth(2), 2);
        assert_eq!(reduction_depth(3), 2);
        assert_eq!(reduction_depth(7), 4);
        assert_eq!(reduction_depth(8), 5);
    }

    #[test]
    fn depth_always_covers_tournament() {
        // ceil(log2(m)) levels are needed to pair m files down to one
        for m in 1usize..200 {
            let needed = (m as f64).log2().ceil() as usize;
            assert!(reduction_depth(m) >= needed, "m={m}");
        }
    }
}
