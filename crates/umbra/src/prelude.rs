//! Umbra Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use umbra::prelude::*;
//! ```

// Core types
pub use umbra_core::{
    Group, GroupEndpoint, MigrationKind, Plan, ReplayPhase, ReplayState, Result, Row,
    TableMigration, UmbraError, Value, Version,
};

// Configs
pub use umbra_core::{ReplayConfig, StoreConfig};

// Traits
pub use umbra_core::{
    BulkSink, EventFilter, EventSource, Persistor, Projector, ProjectorRegistry, RecordId,
    ReplayStateStore, SchemaApplier, SqlCatalog, StoredEvent, VersionStore,
};

// Table model
pub use umbra_core::{ColumnSpec, ColumnType, TableSpec};

// Planning and execution
pub use crate::{
    DirSqlCatalog, Executor, MigrationSet, MigrationTarget, Migrator, Planner, TableRegistry,
};

// Replay
pub use crate::{
    group_partitions, OptimizedPersistor, ParallelReplayer, ProjectorsReplayer, ReplayBounds,
    ReplayStats, SinkFactory,
};

// Postgres backends
pub use crate::{PostgresEventSource, PostgresSchema, PostgresSink, PostgresStore};

// Re-export common external deps
pub use anyhow;
pub use std::sync::Arc;
pub use tracing;
