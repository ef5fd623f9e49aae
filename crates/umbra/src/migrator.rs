//! Two-phase view-schema migration.
//!
//! `migrate_online` runs while the application serves traffic: it creates
//! the suffixed replay tables, rebuilds them from the event log in
//! parallel, and records the transaction-id watermark it replayed up to.
//! `migrate_offline` is the short exclusive step: it catches up on events
//! that arrived since the watermark, swaps the tables into place inside one
//! transaction, applies in-place alterations and bumps the persisted
//! version.
//!
//! A failure during the online phase leaves the live schema untouched —
//! only suffixed tables existed, and they are dropped again on the way
//! out. A failure during the offline swap rolls back with the transaction.

use crate::executor::Executor;
use crate::planner::{MigrationSet, Planner};
use crate::replay_lifecycle::SinkFactory;
use crate::tables::TableRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use umbra_core::error::Result;
use umbra_core::traits::{
    EventSource, ProjectorRegistry, SchemaApplier, SqlCatalog, VersionStore,
};
use umbra_core::types::{Plan, Version};
use umbra_core::ReplayConfig;
use umbra_replay::{OptimizedPersistor, ParallelReplayer, ReplayBounds, ReplayStats};

pub struct Migrator {
    set: MigrationSet,
    catalog: Arc<dyn SqlCatalog>,
    schema: Arc<dyn SchemaApplier>,
    source: Arc<dyn EventSource>,
    versions: Arc<dyn VersionStore>,
    sink_factory: SinkFactory,
    tables: TableRegistry,
    config: ReplayConfig,
}

impl Migrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        set: MigrationSet,
        catalog: Arc<dyn SqlCatalog>,
        schema: Arc<dyn SchemaApplier>,
        source: Arc<dyn EventSource>,
        versions: Arc<dyn VersionStore>,
        sink_factory: SinkFactory,
        config: ReplayConfig,
    ) -> Self {
        Self {
            set,
            catalog,
            schema,
            source,
            versions,
            sink_factory,
            tables: TableRegistry::new(),
            config,
        }
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    pub fn current_version(&self) -> Result<Version> {
        self.versions.current_version()
    }

    pub fn latest_version(&self) -> Version {
        self.set.latest_version()
    }

    /// Plan from the persisted current version up to `new_version`
    pub fn plan_to(&self, new_version: Version) -> Result<Plan> {
        let current = self.versions.current_version()?;
        Planner::new(&self.set, &*self.catalog).plan(current, new_version)
    }

    /// Online phase: create suffixed tables and rebuild them from history.
    ///
    /// Visible schema is untouched. On replay failure the suffixed tables
    /// are dropped again and the error propagates.
    pub fn migrate_online(&self, new_version: Version) -> Result<ReplayStats> {
        let plan = self.plan_to(new_version)?;
        if plan.is_empty() {
            tracing::info!(version = new_version, "nothing to migrate");
            return Ok(ReplayStats {
                groups: 0,
                events_replayed: 0,
                duration: std::time::Duration::from_secs(0),
            });
        }

        let executor = Executor::new(&*self.schema, &*self.catalog, &self.tables);
        executor.execute_online(&plan, new_version)?;

        // Watermark first, then replay everything below it; the offline
        // phase replays the remainder.
        let watermark = self.source.current_xact_id()?;
        match self.replay_into_new_tables(&plan, ReplayBounds::below(watermark)) {
            Ok(stats) => {
                self.versions.set_online_watermark(Some(watermark))?;
                Ok(stats)
            }
            Err(error) => {
                tracing::error!("online replay failed, dropping new tables: {error}");
                if let Err(rollback_error) = executor.abort_online(&plan, new_version) {
                    tracing::error!("rollback of online phase failed: {rollback_error}");
                }
                Err(error)
            }
        }
    }

    /// Offline phase: catch up on the delta that arrived during the online
    /// phase, then swap tables, apply alterations and bump the version.
    ///
    /// The swap batch runs in a single transaction; the store's atomicity
    /// discards partial renames on failure.
    pub fn migrate_offline(&self, new_version: Version) -> Result<()> {
        let current = self.versions.current_version()?;
        let plan = self.plan_to(new_version)?;
        if plan.is_empty() {
            return Ok(());
        }

        // Re-enter: the suffixed tables from the online phase are the
        // replay targets again.
        self.tables.set_table_names_to_new_version(&plan, new_version);

        if let Some(watermark) = self.versions.online_watermark()? {
            let now = self.source.current_xact_id()?;
            let stats =
                self.replay_into_new_tables(&plan, ReplayBounds::between(watermark, now))?;
            tracing::info!(events = stats.events_replayed, "offline catch-up replayed");
        }

        let executor = Executor::new(&*self.schema, &*self.catalog, &self.tables);
        executor.execute_offline(&plan, current, new_version)?;
        self.versions.set_online_watermark(None)?;
        self.versions.set_current_version(new_version)?;
        tracing::info!(from = current, to = new_version, "view schema migrated");
        Ok(())
    }

    fn replay_into_new_tables(&self, plan: &Plan, bounds: ReplayBounds) -> Result<ReplayStats> {
        let registry = Arc::new(ProjectorRegistry::from_projectors(
            plan.projectors.iter().cloned(),
        ));

        // Only tables being replayed flush to suffixed names
        let replayed: Vec<String> = plan.replay_tables().map(|m| m.table.clone()).collect();
        let physical: HashMap<String, String> = replayed
            .iter()
            .map(|table| (table.clone(), self.tables.physical(table)))
            .collect();

        let specs: Vec<_> = registry
            .managed_tables()
            .into_iter()
            .filter(|spec| replayed.contains(&spec.name))
            .collect();
        let threshold = self.config.bulk_insert_threshold;
        let sink_factory = &self.sink_factory;
        let make_persistor = move || -> Result<OptimizedPersistor> {
            let sink = sink_factory()?;
            Ok(
                OptimizedPersistor::new(sink, specs.clone(), threshold)
                    .with_physical_names(&physical),
            )
        };

        ParallelReplayer::new(&*self.source, &registry, self.config.clone())
            .replay_all(&make_persistor, bounds)
    }
}
