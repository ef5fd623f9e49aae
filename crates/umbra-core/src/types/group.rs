use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A boundary in the combined `(partition_key, aggregate_id)` key space.
///
/// Ordered lexicographically: first by partition key, then by aggregate id
/// interpreted as an unsigned 128-bit integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupEndpoint {
    pub partition_key: String,
    pub aggregate_id: Uuid,
}

impl GroupEndpoint {
    pub fn new(partition_key: impl Into<String>, aggregate_id: Uuid) -> Self {
        Self {
            partition_key: partition_key.into(),
            aggregate_id,
        }
    }

    /// Lowest endpoint of a partition: the all-zero id
    pub fn min_of(partition_key: impl Into<String>) -> Self {
        Self::new(partition_key, Uuid::nil())
    }

    /// Highest endpoint of a partition: the all-`f` id
    pub fn max_of(partition_key: impl Into<String>) -> Self {
        Self::new(partition_key, Uuid::from_u128(u128::MAX))
    }
}

impl fmt::Display for GroupEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.aggregate_id)
    }
}

/// A contiguous, inclusive range of the key space assigned to one replay
/// worker. The groups of a replay run partition the full key space with no
/// gaps and no overlaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub lower: GroupEndpoint,
    pub upper: GroupEndpoint,
}

impl Group {
    pub fn new(lower: GroupEndpoint, upper: GroupEndpoint) -> Self {
        debug_assert!(lower <= upper, "group lower bound above upper bound");
        Self { lower, upper }
    }

    pub fn contains(&self, partition_key: &str, aggregate_id: Uuid) -> bool {
        let at = (partition_key, aggregate_id);
        let lower = (self.lower.partition_key.as_str(), self.lower.aggregate_id);
        let upper = (self.upper.partition_key.as_str(), self.upper.aggregate_id);
        at >= lower && at <= upper
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_ordering() {
        let a = GroupEndpoint::new("a", Uuid::from_u128(u128::MAX));
        let b = GroupEndpoint::new("b", Uuid::nil());
        assert!(a < b);
        assert!(
            GroupEndpoint::new("a", Uuid::from_u128(1)) < GroupEndpoint::new("a", Uuid::from_u128(2))
        );
    }

    #[test]
    fn test_group_contains() {
        let g = Group::new(
            GroupEndpoint::new("a", Uuid::from_u128(10)),
            GroupEndpoint::new("b", Uuid::from_u128(5)),
        );
        assert!(g.contains("a", Uuid::from_u128(10)));
        assert!(g.contains("a", Uuid::from_u128(u128::MAX)));
        assert!(g.contains("b", Uuid::from_u128(5)));
        assert!(!g.contains("b", Uuid::from_u128(6)));
        assert!(!g.contains("a", Uuid::from_u128(9)));
    }
}
