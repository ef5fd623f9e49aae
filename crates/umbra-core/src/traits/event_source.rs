use crate::error::Result;
use crate::types::Group;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One event as read back from the log
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub partition_key: String,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,
    pub event_type: String,
    pub payload: serde_json::Value,

    /// Transaction id the event was committed under; the replay watermark
    /// is a bound over this value
    pub xact_id: i64,
}

/// Filter for a streaming pass over the event log
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Event types of interest; empty matches nothing
    pub event_types: Vec<String>,

    /// Restrict to one replay group's key range
    pub group: Option<Group>,

    /// Only events with `xact_id < bound`
    pub xact_id_below: Option<i64>,

    /// Only events with `xact_id >= bound`
    pub xact_id_at_or_above: Option<i64>,
}

impl EventFilter {
    pub fn for_types(event_types: Vec<String>) -> Self {
        Self {
            event_types,
            ..Self::default()
        }
    }

    pub fn within(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    pub fn below(mut self, xact_id: i64) -> Self {
        self.xact_id_below = Some(xact_id);
        self
    }

    pub fn at_or_above(mut self, xact_id: i64) -> Self {
        self.xact_id_at_or_above = Some(xact_id);
        self
    }

    pub fn matches(&self, event: &StoredEvent) -> bool {
        if !self.event_types.iter().any(|t| *t == event.event_type) {
            return false;
        }
        if let Some(group) = &self.group {
            if !group.contains(&event.partition_key, event.aggregate_id) {
                return false;
            }
        }
        if let Some(bound) = self.xact_id_below {
            if event.xact_id >= bound {
                return false;
            }
        }
        if let Some(bound) = self.xact_id_at_or_above {
            if event.xact_id < bound {
                return false;
            }
        }
        true
    }
}

/// Read side of the append-only event log.
///
/// Implementations must stream events ordered by
/// `(partition_key, aggregate_id, sequence_number)` and must open their own
/// storage connection per streaming pass: during parallel replay every
/// worker calls `stream` on its own thread and owns that connection for the
/// duration of its group.
pub trait EventSource: Send + Sync {
    /// Approximate total event count, from query planner statistics where
    /// the backend offers them; used only to size replay groups
    fn estimate_event_count(&self) -> Result<u64>;

    /// Exact per-partition counts for the given event types, in partition
    /// key order
    fn partition_counts(&self, event_types: &[String]) -> Result<BTreeMap<String, u64>>;

    /// Current transaction-id watermark: every event committed before this
    /// call has `xact_id` below the returned value
    fn current_xact_id(&self) -> Result<i64>;

    /// Stream matching events in `(partition_key, aggregate_id,
    /// sequence_number)` order, returning the number streamed. An error
    /// from `apply` aborts the pass and propagates.
    fn stream(
        &self,
        filter: &EventFilter,
        apply: &mut dyn FnMut(StoredEvent) -> Result<()>,
    ) -> Result<u64>;
}
