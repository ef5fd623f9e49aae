use serde::{Deserialize, Serialize};

/// Configuration for parallel event replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Number of replay workers
    /// Default: 4
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Target number of events per replay group
    /// Default: 250_000
    #[serde(default = "default_target_group_size")]
    pub target_group_size: u64,

    /// Row count above which a table flush uses the bulk columnar load
    /// path instead of a multi-row insert
    /// Default: 50
    #[serde(default = "default_bulk_insert_threshold")]
    pub bulk_insert_threshold: usize,
}

fn default_worker_count() -> usize {
    4
}

fn default_target_group_size() -> u64 {
    250_000
}

fn default_bulk_insert_threshold() -> usize {
    50
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            target_group_size: default_target_group_size(),
            bulk_insert_threshold: default_bulk_insert_threshold(),
        }
    }
}

impl ReplayConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_target_group_size(mut self, target_group_size: u64) -> Self {
        self.target_group_size = target_group_size;
        self
    }

    pub fn with_bulk_insert_threshold(mut self, threshold: usize) -> Self {
        self.bulk_insert_threshold = threshold;
        self
    }
}
