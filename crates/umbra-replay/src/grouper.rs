//! Partitioning of the event key space into replay groups.
//!
//! Replay parallelizes over contiguous ranges of the combined
//! `(partition_key, aggregate_id)` key space. Boundaries are computed from
//! per-partition event counts alone, assuming events are uniformly
//! distributed across the 128-bit aggregate-id space within each partition;
//! no table scan is needed to find them.

use std::collections::BTreeMap;
use umbra_core::types::{Group, GroupEndpoint};
use uuid::Uuid;

/// Split the key space into contiguous groups of roughly
/// `target_group_size` events each.
///
/// Partitions are consumed in key order, carrying a remainder when a
/// partition is split across groups. The returned groups are ascending,
/// adjacent (no gap, no overlap) and cover the full key space from the
/// first partition's all-zero id to the last partition's all-`f` id.
pub fn group_partitions(
    partition_counts: &BTreeMap<String, u64>,
    target_group_size: u64,
) -> Vec<Group> {
    let target = target_group_size.max(1);
    let mut groups = Vec::new();
    let mut open_lower: Option<GroupEndpoint> = None;
    let mut open_size: u64 = 0;
    let mut last_key: Option<&str> = None;

    for (key, &count) in partition_counts {
        if count == 0 {
            continue;
        }
        last_key = Some(key);
        let original = count;
        let mut remaining = count;
        // Offset already consumed within this partition's id space
        let mut lower: u128 = 0;

        if open_lower.is_none() {
            open_lower = Some(GroupEndpoint::min_of(key.clone()));
        }

        loop {
            if open_size + remaining < target {
                // Partition fits entirely; keep the group open
                open_size += remaining;
                break;
            } else if open_size + remaining == target {
                // Exactly reaches the target: close at the partition max
                groups.push(Group::new(
                    open_lower.take().expect("open group"),
                    GroupEndpoint::max_of(key.clone()),
                ));
                open_size = 0;
                break;
            } else {
                // Would exceed the target: split the partition
                // proportionally within its id space
                let taken = target - open_size;
                let offset = id_offset(taken, original);
                let upper = lower + offset - 1;
                groups.push(Group::new(
                    open_lower.take().expect("open group"),
                    GroupEndpoint::new(key.clone(), Uuid::from_u128(upper)),
                ));
                lower += offset;
                remaining -= taken;
                open_size = 0;
                open_lower = Some(GroupEndpoint::new(key.clone(), Uuid::from_u128(lower)));
            }
        }
    }

    if let Some(lower) = open_lower {
        // Close the trailing partial group at the last partition's max id
        let key = last_key.expect("open group implies a partition");
        groups.push(Group::new(lower, GroupEndpoint::max_of(key)));
    }

    groups
}

/// Exact `taken * 2^128 / size` for `taken < size <= u64::MAX`.
///
/// `2^128` does not fit in `u128`, so the quotient is computed by long
/// division in base `2^64`: both partial quotients fit in 64 bits because
/// `taken < size`.
fn id_offset(taken: u64, size: u64) -> u128 {
    debug_assert!(taken < size);
    let size = size as u128;
    let hi = (taken as u128) << 64;
    let q1 = hi / size;
    let r1 = hi % size;
    let q2 = (r1 << 64) / size;
    (q1 << 64) | q2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    /// Successor of an endpoint in the global key order, given the sorted
    /// partition keys.
    fn successor(endpoint: &GroupEndpoint, keys: &[&str]) -> Option<GroupEndpoint> {
        if let Some(next_id) = endpoint.aggregate_id.as_u128().checked_add(1) {
            return Some(GroupEndpoint::new(
                endpoint.partition_key.clone(),
                Uuid::from_u128(next_id),
            ));
        }
        let pos = keys.iter().position(|k| *k == endpoint.partition_key)?;
        keys.get(pos + 1).map(|k| GroupEndpoint::min_of(*k))
    }

    fn assert_covers_key_space(groups: &[Group], partition_counts: &BTreeMap<String, u64>) {
        let keys: Vec<&str> = partition_counts
            .iter()
            .filter(|(_, c)| **c > 0)
            .map(|(k, _)| k.as_str())
            .collect();
        assert!(!groups.is_empty());
        assert_eq!(groups[0].lower, GroupEndpoint::min_of(keys[0]));
        assert_eq!(
            groups.last().unwrap().upper,
            GroupEndpoint::max_of(*keys.last().unwrap())
        );
        for group in groups {
            assert!(group.lower <= group.upper, "inverted group {group}");
        }
        for pair in groups.windows(2) {
            let expected = successor(&pair[0].upper, &keys).expect("successor");
            assert_eq!(pair[1].lower, expected, "gap or overlap after {}", pair[0]);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(group_partitions(&BTreeMap::new(), 100).is_empty());
        assert!(group_partitions(&counts(&[("a", 0)]), 100).is_empty());
    }

    #[test]
    fn test_splits_partition_at_midpoint() {
        let groups = group_partitions(&counts(&[("a", 200), ("b", 600), ("c", 200)]), 500);
        assert_eq!(groups.len(), 2);

        // 300 of b's 600 events close the first group exactly halfway
        // through b's id space.
        assert_eq!(groups[0].lower, GroupEndpoint::min_of("a"));
        assert_eq!(
            groups[0].upper,
            GroupEndpoint::new("b", Uuid::from_u128((1u128 << 127) - 1))
        );
        assert_eq!(
            groups[1].lower,
            GroupEndpoint::new("b", Uuid::from_u128(1u128 << 127))
        );
        assert_eq!(groups[1].upper, GroupEndpoint::max_of("c"));
    }

    #[test]
    fn test_deterministic() {
        let input = counts(&[("a", 200), ("b", 600), ("c", 200)]);
        let first = group_partitions(&input, 500);
        for _ in 0..3 {
            assert_eq!(group_partitions(&input, 500), first);
        }
    }

    #[test]
    fn test_single_giant_partition_subdivides_linearly() {
        let groups = group_partitions(&counts(&[("p", 1000)]), 250);
        assert_eq!(groups.len(), 4);
        let quarter = 1u128 << 126;
        for (i, group) in groups.iter().take(3).enumerate() {
            assert_eq!(
                group.upper.aggregate_id.as_u128(),
                quarter * (i as u128 + 1) - 1
            );
        }
        assert_covers_key_space(&groups, &counts(&[("p", 1000)]));
    }

    #[test]
    fn test_small_partitions_merge_into_one_group() {
        let input = counts(&[("a", 3), ("b", 4), ("c", 2)]);
        let groups = group_partitions(&input, 100);
        assert_eq!(groups.len(), 1);
        assert_covers_key_space(&groups, &input);
    }

    #[test]
    fn test_exact_boundary_closes_at_partition_max() {
        let input = counts(&[("a", 100), ("b", 100)]);
        let groups = group_partitions(&input, 100);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].upper, GroupEndpoint::max_of("a"));
        assert_eq!(groups[1].lower, GroupEndpoint::min_of("b"));
        assert_covers_key_space(&groups, &input);
    }

    #[test]
    fn test_coverage_invariants_across_inputs() {
        let inputs = [
            counts(&[("a", 1)]),
            counts(&[("a", 7), ("b", 13), ("c", 1), ("d", 4000)]),
            counts(&[("only", 12345)]),
            counts(&[("a", 1), ("b", 0), ("c", 1)]),
            counts(&[("p1", 999), ("p2", 1), ("p3", 500)]),
        ];
        for input in &inputs {
            for target in [1, 2, 3, 50, 1000] {
                let groups = group_partitions(input, target);
                assert_covers_key_space(&groups, input);
            }
        }
    }

    #[test]
    fn test_target_of_one_yields_one_group_per_event() {
        let input = counts(&[("a", 3)]);
        let groups = group_partitions(&input, 1);
        assert_eq!(groups.len(), 3);
        assert_covers_key_space(&groups, &input);
    }

    #[test]
    fn test_id_offset_exactness() {
        // taken/size = 1/2 -> half the id space
        assert_eq!(id_offset(1, 2), 1u128 << 127);
        // 300/600 -> half
        assert_eq!(id_offset(300, 600), 1u128 << 127);
        // 1/3 rounds down
        let third = id_offset(1, 3);
        assert_eq!(third, u128::MAX / 3);
    }
}
