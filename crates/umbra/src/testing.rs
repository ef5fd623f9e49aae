//! In-memory implementations of the storage trait seams.
//!
//! Used by this crate's integration tests and available to downstream
//! applications for testing projectors and migration wiring without a
//! database.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::{
    BulkSink, EventFilter, EventSource, ReplayStateStore, SchemaApplier, SqlCatalog, StateUpdate,
    StoredEvent, TableFlush, VersionStore,
};
use umbra_core::types::{ReplayPhase, ReplayState, Value, Version};

/// Event log held in a `Vec`, streamed in key order
#[derive(Default)]
pub struct MemoryEventSource {
    events: Mutex<Vec<StoredEvent>>,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: StoredEvent) {
        self.events.lock().push(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSource for MemoryEventSource {
    fn estimate_event_count(&self) -> Result<u64> {
        Ok(self.events.lock().len() as u64)
    }

    fn partition_counts(&self, event_types: &[String]) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for event in self.events.lock().iter() {
            if event_types.iter().any(|t| *t == event.event_type) {
                *counts.entry(event.partition_key.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn current_xact_id(&self) -> Result<i64> {
        let max = self.events.lock().iter().map(|e| e.xact_id).max().unwrap_or(0);
        Ok(max + 1)
    }

    fn stream(
        &self,
        filter: &EventFilter,
        apply: &mut dyn FnMut(StoredEvent) -> Result<()>,
    ) -> Result<u64> {
        let mut matching: Vec<StoredEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (&a.partition_key, a.aggregate_id, a.sequence_number).cmp(&(
                &b.partition_key,
                b.aggregate_id,
                b.sequence_number,
            ))
        });
        let count = matching.len() as u64;
        for event in matching {
            apply(event)?;
        }
        Ok(count)
    }
}

/// Replay state rows behind a mutex, single-active enforced like the
/// partial unique index would
#[derive(Default)]
pub struct MemoryReplayStateStore {
    rows: Mutex<Vec<ReplayState>>,
}

impl MemoryReplayStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ReplayState> {
        self.rows.lock().clone()
    }
}

impl ReplayStateStore for MemoryReplayStateStore {
    fn create(&self, projector_names: &[String]) -> Result<ReplayState> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|r| !r.state.is_terminal()) {
            return Err(UmbraError::ConcurrentMigration(
                "another replay run is already active".into(),
            ));
        }
        let now = chrono::Utc::now();
        let state = ReplayState {
            id: rows.len() as i64 + 1,
            state: ReplayPhase::Created,
            projector_names: projector_names.to_vec(),
            continue_replay_at_xact_id: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(state.clone());
        Ok(state)
    }

    fn active(&self) -> Result<Option<ReplayState>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|r| !r.state.is_terminal())
            .cloned())
    }

    fn get(&self, id: i64) -> Result<ReplayState> {
        self.rows
            .lock()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| UmbraError::InvalidState(format!("no replay run with id {id}")))
    }

    fn transition(
        &self,
        id: i64,
        expected: &[ReplayPhase],
        next: ReplayPhase,
        update: StateUpdate,
    ) -> Result<ReplayState> {
        let mut rows = self.rows.lock();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| UmbraError::InvalidState(format!("no replay run with id {id}")))?;
        if !expected.contains(&row.state) {
            return Err(UmbraError::ConcurrentMigration(format!(
                "replay run {id} is '{}', expected one of {expected:?}",
                row.state
            )));
        }
        row.state = next;
        if let Some(watermark) = update.continue_replay_at_xact_id {
            row.continue_replay_at_xact_id = Some(watermark);
        }
        row.updated_at = chrono::Utc::now();
        Ok(row.clone())
    }
}

/// Records DDL instead of executing it; tracks tables and schemas so the
/// lifecycle's existence/emptiness checks behave
#[derive(Default)]
pub struct MemorySchema {
    pub statements: Mutex<Vec<String>>,
    schemas: Mutex<HashSet<String>>,
    /// physical table name -> row count
    tables: Mutex<HashMap<String, u64>>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, rows: u64) -> Self {
        self.tables.lock().insert(name.to_string(), rows);
        self
    }

    pub fn set_row_count(&self, table: &str, rows: u64) {
        self.tables.lock().insert(table.to_string(), rows);
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.lock().contains_key(table)
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.lock().contains(name)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

impl SchemaApplier for MemorySchema {
    fn exec_sql(&self, sql: &str) -> Result<()> {
        self.statements.lock().push(sql.to_string());
        Ok(())
    }

    fn exec_batch(&self, statements: &[String]) -> Result<()> {
        self.statements.lock().extend(statements.iter().cloned());
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.has_table(table))
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        Ok(self.tables.lock().get(table).copied().unwrap_or(0))
    }

    fn truncate_table(&self, table: &str) -> Result<()> {
        self.statements.lock().push(format!("TRUNCATE {table}"));
        self.tables.lock().insert(table.to_string(), 0);
        Ok(())
    }

    fn create_schema(&self, name: &str) -> Result<()> {
        self.statements
            .lock()
            .push(format!("CREATE SCHEMA IF NOT EXISTS {name}"));
        self.schemas.lock().insert(name.to_string());
        Ok(())
    }

    fn drop_schema(&self, name: &str) -> Result<()> {
        self.statements
            .lock()
            .push(format!("DROP SCHEMA IF EXISTS {name} CASCADE"));
        self.schemas.lock().remove(name);
        let prefix = format!("{name}.");
        self.tables.lock().retain(|table, _| !table.starts_with(&prefix));
        Ok(())
    }

    fn create_table_like(&self, source: &str, target: &str) -> Result<()> {
        self.statements
            .lock()
            .push(format!("CREATE TABLE {target} (LIKE {source} INCLUDING ALL)"));
        self.tables.lock().entry(target.to_string()).or_insert(0);
        Ok(())
    }
}

/// Collects flushed batches; flushed row counts feed back into an optional
/// linked [`MemorySchema`] so emptiness checks see them
#[derive(Default)]
pub struct MemorySink {
    flushes: Mutex<Vec<TableFlush>>,
    schema: Option<Arc<MemorySchema>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror flushed row counts into the schema's table map
    pub fn linked_to(schema: Arc<MemorySchema>) -> Self {
        Self {
            flushes: Mutex::new(Vec::new()),
            schema: Some(schema),
        }
    }

    pub fn flushes(&self) -> Vec<TableFlush> {
        self.flushes.lock().clone()
    }

    pub fn rows_for(&self, table: &str) -> Vec<Vec<Value>> {
        self.flushes
            .lock()
            .iter()
            .filter(|f| f.table == table)
            .flat_map(|f| f.rows.iter().cloned())
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.flushes.lock().iter().map(|f| f.rows.len()).sum()
    }
}

impl BulkSink for MemorySink {
    fn flush(&self, batches: &[TableFlush]) -> Result<()> {
        if let Some(schema) = &self.schema {
            for batch in batches {
                let mut tables = schema.tables.lock();
                *tables.entry(batch.table.clone()).or_insert(0) += batch.rows.len() as u64;
            }
        }
        self.flushes.lock().extend(batches.iter().cloned());
        Ok(())
    }
}

/// Version store behind a mutex
#[derive(Default)]
pub struct MemoryVersionStore {
    version: Mutex<Version>,
    watermark: Mutex<Option<i64>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionStore for MemoryVersionStore {
    fn current_version(&self) -> Result<Version> {
        Ok(*self.version.lock())
    }

    fn set_current_version(&self, version: Version) -> Result<()> {
        *self.version.lock() = version;
        Ok(())
    }

    fn online_watermark(&self) -> Result<Option<i64>> {
        Ok(*self.watermark.lock())
    }

    fn set_online_watermark(&self, xact_id: Option<i64>) -> Result<()> {
        *self.watermark.lock() = xact_id;
        Ok(())
    }
}

/// SQL artifacts held in maps
#[derive(Default)]
pub struct MemoryCatalog {
    replay_sql: HashMap<String, String>,
    alter_sql: HashMap<(String, Version), String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replay_table(mut self, table: &str, sql: &str) -> Self {
        self.replay_sql.insert(table.to_string(), sql.to_string());
        self
    }

    pub fn with_alter_table(mut self, table: &str, version: Version, sql: &str) -> Self {
        self.alter_sql
            .insert((table.to_string(), version), sql.to_string());
        self
    }
}

impl SqlCatalog for MemoryCatalog {
    fn replay_table_sql(&self, table: &str) -> Result<String> {
        self.replay_sql.get(table).cloned().ok_or_else(|| {
            UmbraError::MissingMigrationArtifact(format!("{table}.sql"))
        })
    }

    fn alter_table_sql(&self, table: &str, version: Version) -> Result<String> {
        self.alter_sql
            .get(&(table.to_string(), version))
            .cloned()
            .ok_or_else(|| {
                UmbraError::MissingMigrationArtifact(format!("{table}_{version}.sql"))
            })
    }

    fn has_alter_table_sql(&self, table: &str, version: Version) -> bool {
        self.alter_sql.contains_key(&(table.to_string(), version))
    }
}

/// Sink factory returning clones of one shared sink
pub fn shared_sink_factory(sink: Arc<MemorySink>) -> crate::replay_lifecycle::SinkFactory {
    Arc::new(move || Ok(sink.clone() as Arc<dyn BulkSink>))
}
