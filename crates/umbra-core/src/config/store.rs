use serde::{Deserialize, Serialize};

/// Configuration for the backing event/projection store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL
    pub url: String,

    /// Name of the event log table
    /// Default: "events"
    #[serde(default = "default_events_table")]
    pub events_table: String,

    /// Name of the replay run state table
    /// Default: "umbra_replay_states"
    #[serde(default = "default_replay_states_table")]
    pub replay_states_table: String,

    /// Name of the view-schema version table
    /// Default: "umbra_versions"
    #[serde(default = "default_versions_table")]
    pub versions_table: String,

    /// Schema that shadow tables are created in during live replay
    /// Default: "umbra_shadow"
    #[serde(default = "default_shadow_schema")]
    pub shadow_schema: String,

    /// Below this estimated row count the event count is computed exactly;
    /// above it the query planner's statistics are trusted
    /// Default: 1_000_000
    #[serde(default = "default_exact_count_threshold")]
    pub exact_count_threshold: u64,

    /// Rows fetched per cursor round-trip while streaming events
    /// Default: 10_000
    #[serde(default = "default_stream_batch_size")]
    pub stream_batch_size: u32,
}

fn default_events_table() -> String {
    "events".into()
}

fn default_replay_states_table() -> String {
    "umbra_replay_states".into()
}

fn default_versions_table() -> String {
    "umbra_versions".into()
}

fn default_shadow_schema() -> String {
    "umbra_shadow".into()
}

fn default_exact_count_threshold() -> u64 {
    1_000_000
}

fn default_stream_batch_size() -> u32 {
    10_000
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            events_table: default_events_table(),
            replay_states_table: default_replay_states_table(),
            versions_table: default_versions_table(),
            shadow_schema: default_shadow_schema(),
            exact_count_threshold: default_exact_count_threshold(),
            stream_batch_size: default_stream_batch_size(),
        }
    }

    pub fn with_events_table(mut self, table: impl Into<String>) -> Self {
        self.events_table = table.into();
        self
    }

    pub fn with_shadow_schema(mut self, schema: impl Into<String>) -> Self {
        self.shadow_schema = schema.into();
        self
    }

    pub fn with_exact_count_threshold(mut self, threshold: u64) -> Self {
        self.exact_count_threshold = threshold;
        self
    }
}
