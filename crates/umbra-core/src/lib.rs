//! Core types, traits and configuration for Umbra.
//!
//! Umbra keeps materialized view projections derived from an append-only
//! event log and migrates their shape without stopping the producing
//! application. This crate holds the pieces every other crate agrees on:
//!
//! - **Error type** and `Result` alias
//! - **Plan model**: [`types::TableMigration`], [`types::Plan`]
//! - **Replay model**: [`types::Group`], [`types::ReplayState`]
//! - **Trait seams** for the storage collaborators: event source,
//!   projector registry, persistor, schema applier, replay state store,
//!   bulk sink
//! - **Configuration** structs with serde defaults

pub mod config;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;

pub use config::{ReplayConfig, StoreConfig};
pub use error::{Result, UmbraError};
pub use traits::{
    substitute_suffix, BulkSink, EventFilter, EventSource, FlushMode, Persistor, Projector,
    ProjectorRegistry, RecordId, ReplayStateStore, SchemaApplier, SqlCatalog, StateUpdate,
    StoredEvent, TableFlush, VersionStore, SUFFIX_PLACEHOLDER,
};
pub use types::{
    version_suffix, ColumnSpec, ColumnType, Group, GroupEndpoint, MigrationKind, Plan, ReplayPhase,
    ReplayState, Row, TableMigration, TableSpec, Value, Version,
};
