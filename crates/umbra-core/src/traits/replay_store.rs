use crate::error::Result;
use crate::types::{ReplayPhase, ReplayState, Version};

/// Fields a transition may update alongside the phase change
#[derive(Debug, Clone, Copy, Default)]
pub struct StateUpdate {
    /// New watermark; `None` leaves the stored value untouched
    pub continue_replay_at_xact_id: Option<i64>,
}

impl StateUpdate {
    pub fn watermark(xact_id: i64) -> Self {
        Self {
            continue_replay_at_xact_id: Some(xact_id),
        }
    }
}

/// Persistence of replay run state.
///
/// The state row is the single point of shared mutable coordination state:
/// `transition` must lock the row before reading its phase so two
/// overlapping transitions fail fast instead of corrupting the run.
pub trait ReplayStateStore: Send + Sync {
    /// Allocate a new run in `created`. Fails with
    /// `UmbraError::ConcurrentMigration` when a non-terminal run exists.
    fn create(&self, projector_names: &[String]) -> Result<ReplayState>;

    /// The single non-terminal run, if any
    fn active(&self) -> Result<Option<ReplayState>>;

    fn get(&self, id: i64) -> Result<ReplayState>;

    /// Advance a run under a row lock. The stored phase must be one of
    /// `expected`, otherwise `UmbraError::ConcurrentMigration` — another
    /// process already moved the run.
    fn transition(
        &self,
        id: i64,
        expected: &[ReplayPhase],
        next: ReplayPhase,
        update: StateUpdate,
    ) -> Result<ReplayState>;
}

/// Persisted view-schema version, advanced by the offline migration phase
pub trait VersionStore: Send + Sync {
    fn current_version(&self) -> Result<Version>;

    fn set_current_version(&self, version: Version) -> Result<()>;

    /// Watermark recorded by the online phase so the offline phase can
    /// replay the delta that arrived while the online replay ran
    fn online_watermark(&self) -> Result<Option<i64>>;

    fn set_online_watermark(&self, xact_id: Option<i64>) -> Result<()>;
}
