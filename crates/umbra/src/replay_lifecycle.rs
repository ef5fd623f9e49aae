//! Resumable live replay into a shadow schema.
//!
//! [`ProjectorsReplayer`] drives the multi-step process that rebuilds view
//! tables while the producing application keeps writing: shadow copies of
//! every managed table are created in a separate schema, the historical log
//! is replayed into them below a transaction-id watermark, and the deltas
//! that arrive meanwhile are folded in with repeated incremental passes
//! until the caller swaps the tables and finishes the run.
//!
//! Progress lives in one persisted state row. Every step advances that row
//! under a row lock first, so a crashed run resumes exactly where it
//! stopped and two processes cannot drive the same run concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::{
    BulkSink, EventSource, ProjectorRegistry, ReplayStateStore, SchemaApplier, StateUpdate,
};
use umbra_core::types::{ReplayPhase, ReplayState};
use umbra_core::ReplayConfig;
use umbra_replay::{OptimizedPersistor, ParallelReplayer, ReplayBounds, ReplayStats};

/// Builds one sink (with its own storage connection) per replay worker
pub type SinkFactory = Arc<dyn Fn() -> Result<Arc<dyn BulkSink>> + Send + Sync>;

pub struct ProjectorsReplayer {
    states: Arc<dyn ReplayStateStore>,
    schema: Arc<dyn SchemaApplier>,
    source: Arc<dyn EventSource>,
    registry: Arc<ProjectorRegistry>,
    sink_factory: SinkFactory,
    config: ReplayConfig,
    shadow_schema: String,
}

impl ProjectorsReplayer {
    pub fn new(
        states: Arc<dyn ReplayStateStore>,
        schema: Arc<dyn SchemaApplier>,
        source: Arc<dyn EventSource>,
        registry: Arc<ProjectorRegistry>,
        sink_factory: SinkFactory,
        config: ReplayConfig,
        shadow_schema: impl Into<String>,
    ) -> Self {
        Self {
            states,
            schema,
            source,
            registry,
            sink_factory,
            config,
            shadow_schema: shadow_schema.into(),
        }
    }

    fn shadow_table(&self, table: &str) -> String {
        format!("{}.{}", self.shadow_schema, table)
    }

    fn active_state(&self) -> Result<ReplayState> {
        self.states
            .active()?
            .ok_or_else(|| UmbraError::InvalidState("no active replay run".into()))
    }

    /// Allocate a new run. Fails with a concurrent-migration error while
    /// another run is non-terminal.
    pub fn create(&self) -> Result<ReplayState> {
        let state = self.states.create(&self.registry.names())?;
        tracing::info!(run = state.id, "created replay run");
        Ok(state)
    }

    /// `created → prepared`: create the shadow schema and one empty
    /// structural copy of every managed table
    pub fn prepare_for_replay(&self) -> Result<ReplayState> {
        let state = self.active_state()?;
        let state = self.states.transition(
            state.id,
            &[ReplayPhase::Created],
            ReplayPhase::Prepared,
            StateUpdate::default(),
        )?;
        self.ensure_shadow_tables()?;
        Ok(state)
    }

    fn ensure_shadow_tables(&self) -> Result<()> {
        self.schema.create_schema(&self.shadow_schema)?;
        for table in self.registry.managed_tables() {
            self.schema
                .create_table_like(&table.name, &self.shadow_table(&table.name))?;
        }
        Ok(())
    }

    /// `prepared → initial_replay → ready_for_activation`: replay the full
    /// history below the current snapshot watermark into the shadow tables.
    ///
    /// Fails if any shadow table already holds rows: an initial replay must
    /// start from scratch, anything else means a half-finished run that
    /// `resume` (or `abort`) should handle instead.
    pub fn perform_initial_replay(&self) -> Result<ReplayStats> {
        let state = self.active_state()?;
        self.states.transition(
            state.id,
            &[ReplayPhase::Prepared],
            ReplayPhase::InitialReplay,
            StateUpdate::default(),
        )?;
        for table in self.registry.managed_tables() {
            let shadow = self.shadow_table(&table.name);
            if self.schema.row_count(&shadow)? > 0 {
                return Err(UmbraError::InvalidState(format!(
                    "shadow table {shadow} is not empty before initial replay"
                )));
            }
        }
        self.run_initial_pass(state.id)
    }

    fn run_initial_pass(&self, run_id: i64) -> Result<ReplayStats> {
        let watermark = self.source.current_xact_id()?;
        tracing::info!(run = run_id, watermark, "starting initial replay");
        let stats = self.replay(ReplayBounds::below(watermark))?;
        self.states.transition(
            run_id,
            &[ReplayPhase::InitialReplay],
            ReplayPhase::ReadyForActivation,
            StateUpdate::watermark(watermark),
        )?;
        Ok(stats)
    }

    /// `ready_for_activation → incremental_replay → ready_for_activation`:
    /// replay only the window since the recorded watermark. Repeatable; an
    /// empty window replays nothing, so retries are idempotent.
    pub fn perform_incremental_replay(&self) -> Result<ReplayStats> {
        let state = self.active_state()?;
        let since = state.continue_replay_at_xact_id.ok_or_else(|| {
            UmbraError::InvalidState(format!("replay run {} has no watermark", state.id))
        })?;
        self.states.transition(
            state.id,
            &[ReplayPhase::ReadyForActivation],
            ReplayPhase::IncrementalReplay,
            StateUpdate::default(),
        )?;
        self.run_incremental_pass(state.id, since)
    }

    fn run_incremental_pass(&self, run_id: i64, since: i64) -> Result<ReplayStats> {
        let watermark = self.source.current_xact_id()?;
        tracing::info!(run = run_id, since, watermark, "starting incremental replay");
        let stats = self.replay(ReplayBounds::between(since, watermark))?;
        self.states.transition(
            run_id,
            &[ReplayPhase::IncrementalReplay],
            ReplayPhase::ReadyForActivation,
            StateUpdate::watermark(watermark),
        )?;
        Ok(stats)
    }

    /// `ready_for_activation → done`: the caller has swapped the shadow
    /// tables into place; drop the shadow schema
    pub fn done(&self) -> Result<ReplayState> {
        let state = self.active_state()?;
        let state = self.states.transition(
            state.id,
            &[ReplayPhase::ReadyForActivation],
            ReplayPhase::Done,
            StateUpdate::default(),
        )?;
        self.schema.drop_schema(&self.shadow_schema)?;
        tracing::info!(run = state.id, "replay run finished");
        Ok(state)
    }

    /// Abort from any non-terminal phase and drop the shadow schema
    pub fn abort(&self) -> Result<ReplayState> {
        let state = self.active_state()?;
        let state = self.states.transition(
            state.id,
            ReplayPhase::NON_TERMINAL,
            ReplayPhase::Aborted,
            StateUpdate::default(),
        )?;
        self.schema.drop_schema(&self.shadow_schema)?;
        tracing::warn!(run = state.id, "replay run aborted");
        Ok(state)
    }

    /// Re-enter a crashed run from its last persisted phase and drive it
    /// back to `ready_for_activation`.
    ///
    /// A crash inside the initial replay leaves partially filled shadow
    /// tables; they are truncated and the pass redone from scratch. A crash
    /// inside an incremental pass re-runs the watermark window.
    pub fn resume(&self) -> Result<ReplayState> {
        let state = self.active_state()?;
        tracing::info!(run = state.id, phase = %state.state, "resuming replay run");
        match state.state {
            ReplayPhase::Created => {
                self.prepare_for_replay()?;
                self.perform_initial_replay()?;
            }
            ReplayPhase::Prepared => {
                self.ensure_shadow_tables()?;
                self.perform_initial_replay()?;
            }
            ReplayPhase::InitialReplay => {
                for table in self.registry.managed_tables() {
                    self.schema.truncate_table(&self.shadow_table(&table.name))?;
                }
                self.run_initial_pass(state.id)?;
            }
            ReplayPhase::IncrementalReplay => {
                let since = state.continue_replay_at_xact_id.ok_or_else(|| {
                    UmbraError::InvalidState(format!(
                        "replay run {} has no watermark",
                        state.id
                    ))
                })?;
                self.run_incremental_pass(state.id, since)?;
            }
            ReplayPhase::ReadyForActivation => {}
            ReplayPhase::Done | ReplayPhase::Aborted => unreachable!("terminal runs are not active"),
        }
        self.active_state()
    }

    fn replay(&self, bounds: ReplayBounds) -> Result<ReplayStats> {
        let physical: HashMap<String, String> = self
            .registry
            .managed_tables()
            .into_iter()
            .map(|table| {
                let shadow = self.shadow_table(&table.name);
                (table.name, shadow)
            })
            .collect();
        let specs = self.registry.managed_tables();
        let threshold = self.config.bulk_insert_threshold;
        let sink_factory = &self.sink_factory;
        let make_persistor = move || -> Result<OptimizedPersistor> {
            let sink = sink_factory()?;
            Ok(
                OptimizedPersistor::new(sink, specs.clone(), threshold)
                    .with_physical_names(&physical),
            )
        };

        ParallelReplayer::new(&*self.source, &self.registry, self.config.clone())
            .replay_all(&make_persistor, bounds)
    }
}
