//! Shard planning for bulk uploads.
//!
//! A shard is a contiguous half-open slice of the dataset uploaded in one
//! request. Planning is a pure function of the item count and requested
//! shard size, so a failed shard can always be resubmitted as the same
//! range.

use std::ops::Range;

/// Upload workers get slow beyond this many datums per shard, so requested
/// sizes are capped here.
pub const MAX_SHARD_SIZE: usize = 5000;

/// Partition `[0, total)` into ordered, disjoint ranges of at most
/// `min(requested, MAX_SHARD_SIZE)` items; the final range may be shorter.
pub fn plan_shards(total: usize, requested: usize) -> Vec<Range<usize>> {
    let size = requested.clamp(1, MAX_SHARD_SIZE);
    let mut plan = Vec::with_capacity(total.div_ceil(size));
    let mut offset = 0;
    while offset < total {
        let end = (offset + size).min(total);
        plan.push(offset..end);
        offset = end;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covering(total: usize, requested: usize) {
        let plan = plan_shards(total, requested);
        let effective = requested.clamp(1, MAX_SHARD_SIZE);

        let mut expected_start = 0;
        for range in &plan {
            assert_eq!(range.start, expected_start, "ranges must be contiguous");
            assert!(range.end > range.start, "ranges must be non-empty");
            assert!(range.len() <= effective, "range exceeds effective size");
            expected_start = range.end;
        }
        assert_eq!(expected_start, total, "union must cover [0, total)");
    }

    #[test]
    fn covers_exactly_for_many_sizes() {
        for total in [0, 1, 4, 5, 12, 999, 1000, 1001, 5001, 12345] {
            for requested in [1, 5, 1000, 5000, 9000] {
                assert_covering(total, requested);
            }
        }
    }

    #[test]
    fn twelve_records_shard_size_five() {
        let plan = plan_shards(12, 5);
        assert_eq!(plan, vec![0..5, 5..10, 10..12]);
    }

    #[test]
    fn requested_size_is_capped() {
        let plan = plan_shards(12_000, 9_000);
        assert_eq!(plan, vec![0..5000, 5000..10_000, 10_000..12_000]);
    }

    #[test]
    fn empty_dataset_plans_nothing() {
        assert!(plan_shards(0, 1000).is_empty());
    }

    #[test]
    fn deterministic_for_same_inputs() {
        assert_eq!(plan_shards(777, 100), plan_shards(777, 100));
    }
}
