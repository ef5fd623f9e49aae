//! Umbra: online migration and parallel replay of event-sourced view
//! projections.
//!
//! Umbra maintains materialized view tables derived from an append-only
//! event log and changes their shape **without stopping the producing
//! application** and **without losing or duplicating events**:
//!
//! - **Planner**: diffs declared per-version targets into a minimal,
//!   correctly ordered [`Plan`] of table replays and alterations
//! - **Grouper**: partitions the whole event history into balanced,
//!   deterministic key ranges so replay parallelizes safely
//! - **Replayer**: rebuilds tables through a bounded worker pool, either
//!   one-shot into suffixed tables ([`Migrator`]) or crash-resumably into a
//!   shadow schema while writes continue ([`ProjectorsReplayer`])
//! - **Executor**: realizes a plan in two phases — create suffixed tables
//!   online, swap them into place offline
//! - **Optimized persistor**: buffers each replay group in memory and
//!   flushes once, through a bulk columnar load for large batches
//!
//! # Quick start
//!
//! ```no_run
//! use umbra::prelude::*;
//!
//! # fn projectors() -> Vec<MigrationTarget> { vec![] }
//! # fn main() -> Result<()> {
//! let store = PostgresStore::new(StoreConfig::new("postgres://localhost/app"));
//! let set = MigrationSet::new().declare(1, projectors());
//!
//! let migrator = Migrator::new(
//!     set,
//!     Arc::new(DirSqlCatalog::new("db/view_schema")),
//!     Arc::new(store.schema_applier()),
//!     Arc::new(store.event_source()),
//!     Arc::new(store.versions()?),
//!     {
//!         let store = store.clone();
//!         Arc::new(move || Ok(Arc::new(store.sink()?) as Arc<dyn BulkSink>))
//!     },
//!     ReplayConfig::default(),
//! );
//!
//! migrator.migrate_online(1)?;   // while the app keeps running
//! migrator.migrate_offline(1)?;  // short exclusive swap
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod executor;
pub mod migrator;
pub mod planner;
pub mod prelude;
pub mod replay_lifecycle;
pub mod tables;
pub mod testing;

// Re-export core types
pub use umbra_core::{
    config::{ReplayConfig, StoreConfig},
    error::{Result, UmbraError},
    traits::{
        BulkSink, EventFilter, EventSource, FlushMode, Persistor, Projector, ProjectorRegistry,
        RecordId, ReplayStateStore, SchemaApplier, SqlCatalog, StateUpdate, StoredEvent,
        TableFlush, VersionStore,
    },
    types::{
        version_suffix, ColumnSpec, ColumnType, Group, GroupEndpoint, MigrationKind, Plan,
        ReplayPhase, ReplayState, Row, TableMigration, TableSpec, Value, Version,
    },
};

// Re-export replay mechanics
pub use umbra_replay::{
    group_partitions, OptimizedPersistor, ParallelReplayer, ReplayBounds, ReplayStats,
};

// Row literal macro
pub use umbra_core::row;

// Re-export Postgres backends
pub use umbra_postgres::{
    PostgresEventSource, PostgresReplayStateStore, PostgresSchema, PostgresSink, PostgresStore,
    PostgresVersionStore,
};

// Re-export main types from this crate
pub use catalog::DirSqlCatalog;
pub use executor::Executor;
pub use migrator::Migrator;
pub use planner::{MigrationSet, MigrationTarget, Planner};
pub use replay_lifecycle::{ProjectorsReplayer, SinkFactory};
pub use tables::TableRegistry;
