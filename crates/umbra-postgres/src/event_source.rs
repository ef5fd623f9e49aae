use crate::{pg_err, store::PostgresStore};
use postgres::types::ToSql;
use std::collections::BTreeMap;
use umbra_core::error::Result;
use umbra_core::traits::{EventFilter, EventSource, StoredEvent};
use umbra_core::StoreConfig;

/// Event log reader backed by PostgreSQL.
///
/// The events table must expose `partition_key text`, `aggregate_id uuid`,
/// `sequence_number bigint`, `event_type text`, `event_json jsonb` and
/// `xact_id bigint` (populated from `pg_current_xact_id()` on the write
/// path). Each streaming pass opens its own connection and reads through a
/// server-side portal, so tens of millions of rows never materialize on
/// the client.
pub struct PostgresEventSource {
    config: StoreConfig,
}

impl PostgresEventSource {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

impl EventSource for PostgresEventSource {
    fn estimate_event_count(&self) -> Result<u64> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let row = client
            .query_one(
                "SELECT reltuples::bigint FROM pg_class WHERE oid = $1::regclass",
                &[&self.config.events_table],
            )
            .map_err(pg_err)?;
        let estimate: i64 = row.get(0);

        // Planner statistics are good enough for huge tables; small or
        // never-analyzed tables get an exact count.
        if estimate >= 0 && estimate as u64 >= self.config.exact_count_threshold {
            return Ok(estimate as u64);
        }
        let sql = format!("SELECT count(*) FROM {}", self.config.events_table);
        let row = client.query_one(sql.as_str(), &[]).map_err(pg_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    fn partition_counts(&self, event_types: &[String]) -> Result<BTreeMap<String, u64>> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let types = event_types.to_vec();
        let sql = format!(
            "SELECT partition_key, count(*) FROM {} \
             WHERE event_type = ANY($1) \
             GROUP BY partition_key ORDER BY partition_key",
            self.config.events_table
        );
        let rows = client.query(sql.as_str(), &[&types]).map_err(pg_err)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, i64>(1) as u64))
            .collect())
    }

    fn current_xact_id(&self) -> Result<i64> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let row = client
            .query_one(
                "SELECT pg_snapshot_xmin(pg_current_snapshot())::text::bigint",
                &[],
            )
            .map_err(pg_err)?;
        Ok(row.get(0))
    }

    fn stream(
        &self,
        filter: &EventFilter,
        apply: &mut dyn FnMut(StoredEvent) -> Result<()>,
    ) -> Result<u64> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let mut txn = client.transaction().map_err(pg_err)?;

        let types = filter.event_types.to_vec();
        let mut sql = format!(
            "SELECT partition_key, aggregate_id, sequence_number, event_type, event_json, xact_id \
             FROM {} WHERE event_type = ANY($1)",
            self.config.events_table
        );
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&types];

        if let Some(group) = &filter.group {
            sql.push_str(&format!(
                " AND (partition_key, aggregate_id) >= (${}::text, ${}::uuid) \
                  AND (partition_key, aggregate_id) <= (${}::text, ${}::uuid)",
                params.len() + 1,
                params.len() + 2,
                params.len() + 3,
                params.len() + 4,
            ));
            params.push(&group.lower.partition_key);
            params.push(&group.lower.aggregate_id);
            params.push(&group.upper.partition_key);
            params.push(&group.upper.aggregate_id);
        }
        if let Some(bound) = &filter.xact_id_below {
            sql.push_str(&format!(" AND xact_id < ${}", params.len() + 1));
            params.push(bound);
        }
        if let Some(bound) = &filter.xact_id_at_or_above {
            sql.push_str(&format!(" AND xact_id >= ${}", params.len() + 1));
            params.push(bound);
        }
        sql.push_str(" ORDER BY partition_key, aggregate_id, sequence_number");

        let portal = txn.bind(sql.as_str(), &params).map_err(pg_err)?;
        let batch = self.config.stream_batch_size.max(1) as i32;
        let mut streamed = 0u64;
        loop {
            let rows = txn.query_portal(&portal, batch).map_err(pg_err)?;
            if rows.is_empty() {
                break;
            }
            for row in rows {
                apply(StoredEvent {
                    partition_key: row.get(0),
                    aggregate_id: row.get(1),
                    sequence_number: row.get(2),
                    event_type: row.get(3),
                    payload: row.get(4),
                    xact_id: row.get(5),
                })?;
                streamed += 1;
            }
        }
        txn.commit().map_err(pg_err)?;
        Ok(streamed)
    }
}
