//! Buffered replay persistence.
//!
//! Replaying tens of millions of events one SQL statement at a time is too
//! slow. [`OptimizedPersistor`] buffers every mutation for a replay group
//! in memory and flushes once, through a bulk columnar load for large
//! batches.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::{BulkSink, FlushMode, Persistor, RecordId, TableFlush};
use umbra_core::types::{Row, TableSpec, Value};
use xxhash_rust::xxh3::Xxh3;

/// Lookup index over one table's buffered records.
///
/// Keyed by a hash of the indexed column tuple's normalized values, with a
/// reverse map so mutations can evict a record's stale entries before
/// re-adding it.
#[derive(Default)]
struct RecordIndex {
    tuples: Vec<Vec<String>>,
    buckets: HashMap<u64, BTreeSet<RecordId>>,
    reverse: HashMap<RecordId, Vec<u64>>,
}

impl RecordIndex {
    fn new(tuples: Vec<Vec<String>>) -> Self {
        Self {
            tuples,
            buckets: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    fn key_hash(tuple_idx: usize, values: &[&Value]) -> u64 {
        use std::hash::Hasher;
        let mut hasher = Xxh3::new();
        hasher.write(&tuple_idx.to_le_bytes());
        let mut bytes = Vec::new();
        for value in values {
            bytes.clear();
            value.key_bytes(&mut bytes);
            hasher.write(&(bytes.len() as u64).to_le_bytes());
            hasher.write(&bytes);
        }
        hasher.finish()
    }

    fn add(&mut self, id: RecordId, row: &Row) {
        let mut hashes = Vec::with_capacity(self.tuples.len());
        for (tuple_idx, tuple) in self.tuples.iter().enumerate() {
            let values: Vec<&Value> = tuple
                .iter()
                .map(|col| row.get(col).unwrap_or(&Value::Null))
                .collect();
            let hash = Self::key_hash(tuple_idx, &values);
            self.buckets.entry(hash).or_default().insert(id);
            hashes.push(hash);
        }
        if !hashes.is_empty() {
            self.reverse.insert(id, hashes);
        }
    }

    fn remove(&mut self, id: RecordId) {
        if let Some(hashes) = self.reverse.remove(&id) {
            for hash in hashes {
                if let Some(bucket) = self.buckets.get_mut(&hash) {
                    bucket.remove(&id);
                    if bucket.is_empty() {
                        self.buckets.remove(&hash);
                    }
                }
            }
        }
    }

    /// Candidate ids when the where-clause's column set exactly matches a
    /// declared tuple; `None` means the caller must scan.
    fn candidates(&self, where_clause: &Row) -> Option<Vec<RecordId>> {
        let (tuple_idx, tuple) = self.tuples.iter().enumerate().find(|(_, tuple)| {
            tuple.len() == where_clause.len()
                && tuple.iter().all(|col| where_clause.contains_key(col))
        })?;
        let values: Vec<&Value> = tuple
            .iter()
            .map(|col| where_clause.get(col).expect("checked above"))
            .collect();
        let hash = Self::key_hash(tuple_idx, &values);
        Some(
            self.buckets
                .get(&hash)
                .map(|b| b.iter().copied().collect())
                .unwrap_or_default(),
        )
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.reverse.clear();
    }
}

struct TableBuffer {
    spec: TableSpec,
    /// Physical name written on flush (suffixed or schema-qualified)
    physical: String,
    records: BTreeMap<RecordId, Row>,
    index: RecordIndex,
}

impl TableBuffer {
    fn new(spec: TableSpec, physical: String) -> Self {
        let index = RecordIndex::new(spec.effective_indexes());
        Self {
            spec,
            physical,
            records: BTreeMap::new(),
            index,
        }
    }

    fn matching_ids(&self, where_clause: &Row) -> Vec<RecordId> {
        match self.index.candidates(where_clause) {
            Some(candidates) => candidates
                .into_iter()
                .filter(|id| {
                    self.records
                        .get(id)
                        .map(|row| row_matches(row, where_clause))
                        .unwrap_or(false)
                })
                .collect(),
            None => self
                .records
                .iter()
                .filter(|(_, row)| row_matches(row, where_clause))
                .map(|(id, _)| *id)
                .collect(),
        }
    }
}

fn row_matches(row: &Row, where_clause: &Row) -> bool {
    where_clause.iter().all(|(column, expected)| {
        let actual = row.get(column).unwrap_or(&Value::Null);
        actual.normalized_eq(expected)
    })
}

/// In-memory persistor that batches a replay group's mutations and flushes
/// them in bulk.
///
/// Never shared between workers: each replay worker owns one instance and
/// only the final flush touches shared storage.
pub struct OptimizedPersistor {
    sink: Arc<dyn BulkSink>,
    bulk_insert_threshold: usize,
    tables: BTreeMap<String, TableBuffer>,
    next_id: RecordId,
}

impl OptimizedPersistor {
    pub fn new(
        sink: Arc<dyn BulkSink>,
        specs: impl IntoIterator<Item = TableSpec>,
        bulk_insert_threshold: usize,
    ) -> Self {
        let tables = specs
            .into_iter()
            .map(|spec| {
                let physical = spec.name.clone();
                (spec.name.clone(), TableBuffer::new(spec, physical))
            })
            .collect();
        Self {
            sink,
            bulk_insert_threshold,
            tables,
            next_id: 0,
        }
    }

    /// Rebind logical table names to physical names for the flush, e.g.
    /// version-suffixed or shadow-schema-qualified targets
    pub fn with_physical_names(mut self, names: &HashMap<String, String>) -> Self {
        for (logical, physical) in names {
            if let Some(buffer) = self.tables.get_mut(logical) {
                buffer.physical = physical.clone();
            }
        }
        self
    }

    pub fn buffered_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|b| b.records.len()).unwrap_or(0)
    }

    fn buffer(&self, table: &str) -> Result<&TableBuffer> {
        self.tables
            .get(table)
            .ok_or_else(|| UmbraError::InvalidState(format!("table '{table}' is not managed")))
    }

    fn buffer_mut(&mut self, table: &str) -> Result<&mut TableBuffer> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| UmbraError::InvalidState(format!("table '{table}' is not managed")))
    }
}

impl Persistor for OptimizedPersistor {
    fn create_record(&mut self, table: &str, values: Row) -> Result<RecordId> {
        let id = self.next_id;
        self.next_id += 1;
        let buffer = self.buffer_mut(table)?;

        // Column defaults first, explicit values on top
        let mut row = Row::new();
        for column in &buffer.spec.columns {
            if let Some(default) = &column.default {
                row.insert(column.name.clone(), default.clone());
            }
        }
        row.extend(values);

        buffer.index.add(id, &row);
        buffer.records.insert(id, row);
        Ok(id)
    }

    fn find_records(&self, table: &str, where_clause: &Row) -> Vec<RecordId> {
        self.tables
            .get(table)
            .map(|buffer| buffer.matching_ids(where_clause))
            .unwrap_or_default()
    }

    fn get_record(&self, table: &str, where_clause: &Row) -> Result<RecordId> {
        let ids = self.find_records(table, where_clause);
        ids.first().copied().ok_or_else(|| {
            let contents: Vec<&Row> = self
                .tables
                .get(table)
                .map(|b| b.records.values().collect())
                .unwrap_or_default();
            UmbraError::RecordNotFound(format!(
                "no record in '{table}' matches {where_clause:?}; current contents: {contents:?}"
            ))
        })
    }

    fn record(&self, table: &str, id: RecordId) -> Option<Row> {
        self.tables.get(table)?.records.get(&id).cloned()
    }

    fn update_record(&mut self, table: &str, id: RecordId, updates: Row) -> Result<()> {
        let buffer = self.buffer_mut(table)?;
        let row = buffer.records.get_mut(&id).ok_or_else(|| {
            UmbraError::RecordNotFound(format!("no record {id} in '{table}'"))
        })?;
        // Index keys may change under the update: evict, mutate, re-add
        buffer.index.remove(id);
        row.extend(updates);
        buffer.index.add(id, row);
        Ok(())
    }

    fn update_all_records(
        &mut self,
        table: &str,
        where_clause: &Row,
        updates: Row,
    ) -> Result<usize> {
        let ids = self.buffer(table)?.matching_ids(where_clause);
        for id in &ids {
            self.update_record(table, *id, updates.clone())?;
        }
        Ok(ids.len())
    }

    fn delete_record(&mut self, table: &str, id: RecordId) -> Result<()> {
        let buffer = self.buffer_mut(table)?;
        buffer.records.remove(&id).ok_or_else(|| {
            UmbraError::RecordNotFound(format!("no record {id} in '{table}'"))
        })?;
        buffer.index.remove(id);
        Ok(())
    }

    fn delete_all_records(&mut self, table: &str, where_clause: &Row) -> Result<usize> {
        let ids = self.buffer(table)?.matching_ids(where_clause);
        for id in &ids {
            self.delete_record(table, *id)?;
        }
        Ok(ids.len())
    }

    fn commit(&mut self) -> Result<()> {
        let mut batches = Vec::new();
        for buffer in self.tables.values() {
            if buffer.records.is_empty() {
                continue;
            }
            let columns = buffer.spec.column_names();
            let mut rows = Vec::with_capacity(buffer.records.len());
            for row in buffer.records.values() {
                let mut out = Vec::with_capacity(columns.len());
                for column in &buffer.spec.columns {
                    let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
                    out.push(value.cast_to(column.ty)?);
                }
                rows.push(out);
            }
            let mode = if rows.len() > self.bulk_insert_threshold {
                FlushMode::Copy
            } else {
                FlushMode::Insert
            };
            umbra_core::observe::record_flush(rows.len() as u64, mode == FlushMode::Copy);
            batches.push(TableFlush {
                table: buffer.physical.clone(),
                columns,
                rows,
                mode,
            });
        }

        if !batches.is_empty() {
            self.sink.flush(&batches)?;
        }

        for buffer in self.tables.values_mut() {
            buffer.records.clear();
            buffer.index.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use umbra_core::row;
    use umbra_core::types::ColumnType;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        flushes: Mutex<Vec<Vec<TableFlush>>>,
    }

    impl RecordingSink {
        fn batches(&self) -> Vec<TableFlush> {
            self.flushes.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    impl BulkSink for RecordingSink {
        fn flush(&self, batches: &[TableFlush]) -> Result<()> {
            self.flushes.lock().unwrap().push(batches.to_vec());
            Ok(())
        }
    }

    fn accounts_spec() -> TableSpec {
        TableSpec::new("accounts")
            .column("aggregate_id", ColumnType::Uuid)
            .column("balance", ColumnType::BigInt)
            .column_with_default("active", ColumnType::Boolean, Value::Bool(true))
    }

    fn persistor(sink: Arc<RecordingSink>, threshold: usize) -> OptimizedPersistor {
        OptimizedPersistor::new(sink, [accounts_spec()], threshold)
    }

    #[test]
    fn test_create_merges_defaults() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink, 50);
        let id = p
            .create_record("accounts", row! { "aggregate_id" => Value::Uuid(Uuid::from_u128(1)) })
            .unwrap();
        let row = p.record("accounts", id).unwrap();
        assert_eq!(row.get("active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_round_trip_update_find_commit() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink.clone(), 50);
        let agg = Value::Uuid(Uuid::from_u128(7));
        p.create_record(
            "accounts",
            row! { "aggregate_id" => agg.clone(), "balance" => Value::Int(10) },
        )
        .unwrap();

        let updated = p
            .update_all_records(
                "accounts",
                &row! { "aggregate_id" => agg.clone() },
                row! { "balance" => Value::Int(25) },
            )
            .unwrap();
        assert_eq!(updated, 1);

        let ids = p.find_records("accounts", &row! { "aggregate_id" => agg.clone() });
        assert_eq!(ids.len(), 1);
        let row = p.record("accounts", ids[0]).unwrap();
        assert_eq!(row.get("balance"), Some(&Value::Int(25)));

        p.commit().unwrap();
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].rows.len(), 1);
        assert_eq!(batches[0].mode, FlushMode::Insert);

        // Buffer is empty after commit, and a second commit is a no-op
        assert!(p.find_records("accounts", &row! { "aggregate_id" => agg }).is_empty());
        p.commit().unwrap();
        assert_eq!(sink.batches().len(), 1);
    }

    #[test]
    fn test_identity_not_value_equality() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink, 50);
        let values = row! { "aggregate_id" => Value::Uuid(Uuid::from_u128(3)), "balance" => Value::Int(1) };
        let a = p.create_record("accounts", values.clone()).unwrap();
        let b = p.create_record("accounts", values).unwrap();
        assert_ne!(a, b);
        assert_eq!(p.buffered_count("accounts"), 2);
    }

    #[test]
    fn test_index_agrees_with_scan() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink, 50);
        for i in 0..20u128 {
            p.create_record(
                "accounts",
                row! {
                    "aggregate_id" => Value::Uuid(Uuid::from_u128(i % 5)),
                    "balance" => Value::Int(i as i64),
                },
            )
            .unwrap();
        }
        let clause = row! { "aggregate_id" => Value::Uuid(Uuid::from_u128(2)) };

        // Index-assisted lookup (clause matches the default tuple exactly)
        let indexed = p.find_records("accounts", &clause);

        // Forced scan over every record for comparison
        let buffer = p.buffer("accounts").unwrap();
        let scanned: Vec<RecordId> = buffer
            .records
            .iter()
            .filter(|(_, row)| row_matches(row, &clause))
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(indexed, scanned);
        assert_eq!(indexed.len(), 4);
    }

    #[test]
    fn test_index_follows_mutations() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink, 50);
        let old_id = Value::Uuid(Uuid::from_u128(1));
        let new_id = Value::Uuid(Uuid::from_u128(2));
        let rec = p
            .create_record("accounts", row! { "aggregate_id" => old_id.clone() })
            .unwrap();

        p.update_record("accounts", rec, row! { "aggregate_id" => new_id.clone() })
            .unwrap();
        assert!(p.find_records("accounts", &row! { "aggregate_id" => old_id }).is_empty());
        assert_eq!(
            p.find_records("accounts", &row! { "aggregate_id" => new_id.clone() }),
            vec![rec]
        );

        p.delete_all_records("accounts", &row! { "aggregate_id" => new_id.clone() })
            .unwrap();
        assert!(p.find_records("accounts", &row! { "aggregate_id" => new_id }).is_empty());
    }

    #[test]
    fn test_lookup_with_text_rendering_of_uuid() {
        // Persistor equality is type-normalizing: a uuid column matches its
        // text rendering in a where-clause, index path included.
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink, 50);
        let agg = Uuid::from_u128(11);
        p.create_record("accounts", row! { "aggregate_id" => Value::Uuid(agg) })
            .unwrap();
        let ids = p.find_records(
            "accounts",
            &row! { "aggregate_id" => Value::Text(agg.to_string()) },
        );
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_get_record_error_is_verbose() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink, 50);
        p.create_record("accounts", row! { "balance" => Value::Int(5) })
            .unwrap();
        let err = p
            .get_record("accounts", &row! { "balance" => Value::Int(99) })
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("accounts"));
        assert!(message.contains("99"));
        assert!(message.contains("current contents"));
    }

    #[test]
    fn test_bulk_threshold_selects_copy() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink.clone(), 3);
        for i in 0..5u128 {
            p.create_record(
                "accounts",
                row! { "aggregate_id" => Value::Uuid(Uuid::from_u128(i)) },
            )
            .unwrap();
        }
        p.commit().unwrap();
        assert_eq!(sink.batches()[0].mode, FlushMode::Copy);
    }

    #[test]
    fn test_commit_casts_to_column_types() {
        let sink = Arc::new(RecordingSink::default());
        let mut p = persistor(sink.clone(), 50);
        let agg = Uuid::from_u128(42);
        p.create_record(
            "accounts",
            row! {
                "aggregate_id" => Value::Text(agg.to_string()),
                "balance" => Value::Text("17".into()),
            },
        )
        .unwrap();
        p.commit().unwrap();
        let batch = &sink.batches()[0];
        assert_eq!(batch.rows[0][0], Value::Uuid(agg));
        assert_eq!(batch.rows[0][1], Value::Int(17));
    }

    #[test]
    fn test_physical_name_rebinding() {
        let sink = Arc::new(RecordingSink::default());
        let names =
            HashMap::from([("accounts".to_string(), "umbra_shadow.accounts".to_string())]);
        let mut p = persistor(sink.clone(), 50).with_physical_names(&names);
        p.create_record("accounts", row! { "balance" => Value::Int(1) })
            .unwrap();
        p.commit().unwrap();
        assert_eq!(sink.batches()[0].table, "umbra_shadow.accounts");
    }
}
