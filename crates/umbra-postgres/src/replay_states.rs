use crate::{pg_err, store::PostgresStore};
use postgres::error::SqlState;
use postgres::Row as PgRow;
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::{ReplayStateStore, StateUpdate, VersionStore};
use umbra_core::types::{ReplayPhase, ReplayState, Version};
use umbra_core::StoreConfig;

const STATE_COLUMNS: &str =
    "id, state, projector_names, continue_replay_at_xact_id, created_at, updated_at";

/// Replay run state persisted in PostgreSQL.
///
/// "At most one non-terminal run" is a partial unique index over a
/// constant expression, so a second `create` fails at the store no matter
/// how many processes race.
pub struct PostgresReplayStateStore {
    config: StoreConfig,
}

impl PostgresReplayStateStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self { config };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let table = &self.config.replay_states_table;
        let mut client = PostgresStore::connect_with(&self.config)?;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    state TEXT NOT NULL,
                    projector_names TEXT[] NOT NULL,
                    continue_replay_at_xact_id BIGINT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE UNIQUE INDEX IF NOT EXISTS {table}_single_active
                    ON {table} ((1)) WHERE state NOT IN ('done', 'aborted');"
            ))
            .map_err(pg_err)?;
        Ok(())
    }

    fn from_row(row: &PgRow) -> Result<ReplayState> {
        Ok(ReplayState {
            id: row.get(0),
            state: ReplayPhase::parse(row.get(1))?,
            projector_names: row.get(2),
            continue_replay_at_xact_id: row.get(3),
            created_at: row.get(4),
            updated_at: row.get(5),
        })
    }
}

impl ReplayStateStore for PostgresReplayStateStore {
    fn create(&self, projector_names: &[String]) -> Result<ReplayState> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let names = projector_names.to_vec();
        let sql = format!(
            "INSERT INTO {} (state, projector_names) VALUES ($1, $2) \
             RETURNING {STATE_COLUMNS}",
            self.config.replay_states_table
        );
        let row = client
            .query_one(sql.as_str(), &[&ReplayPhase::Created.as_str(), &names])
            .map_err(|error| {
                if error.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    UmbraError::ConcurrentMigration(
                        "another replay run is already active".into(),
                    )
                } else {
                    pg_err(error)
                }
            })?;
        umbra_core::observe::record_transition("created");
        Self::from_row(&row)
    }

    fn active(&self) -> Result<Option<ReplayState>> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM {} \
             WHERE state NOT IN ('done', 'aborted')",
            self.config.replay_states_table
        );
        let row = client.query_opt(sql.as_str(), &[]).map_err(pg_err)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    fn get(&self, id: i64) -> Result<ReplayState> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM {} WHERE id = $1",
            self.config.replay_states_table
        );
        let row = client
            .query_opt(sql.as_str(), &[&id])
            .map_err(pg_err)?
            .ok_or_else(|| UmbraError::InvalidState(format!("no replay run with id {id}")))?;
        Self::from_row(&row)
    }

    fn transition(
        &self,
        id: i64,
        expected: &[ReplayPhase],
        next: ReplayPhase,
        update: StateUpdate,
    ) -> Result<ReplayState> {
        let table = &self.config.replay_states_table;
        let mut client = PostgresStore::connect_with(&self.config)?;
        let mut txn = client.transaction().map_err(pg_err)?;

        // Row lock first, phase check second: concurrent transitions queue
        // on the lock and then fail the check instead of double-advancing.
        let lock_sql = format!("SELECT state FROM {table} WHERE id = $1 FOR NO KEY UPDATE");
        let row = txn
            .query_opt(lock_sql.as_str(), &[&id])
            .map_err(pg_err)?
            .ok_or_else(|| UmbraError::InvalidState(format!("no replay run with id {id}")))?;
        let found = ReplayPhase::parse(row.get(0))?;
        if !expected.contains(&found) {
            return Err(UmbraError::ConcurrentMigration(format!(
                "replay run {id} is '{found}', expected one of {expected:?}"
            )));
        }

        let update_sql = format!(
            "UPDATE {table} SET state = $2, \
             continue_replay_at_xact_id = COALESCE($3, continue_replay_at_xact_id), \
             updated_at = now() \
             WHERE id = $1 RETURNING {STATE_COLUMNS}"
        );
        let row = txn
            .query_one(
                update_sql.as_str(),
                &[&id, &next.as_str(), &update.continue_replay_at_xact_id],
            )
            .map_err(pg_err)?;
        txn.commit().map_err(pg_err)?;

        tracing::info!(run = id, from = %found, to = %next, "replay state transition");
        umbra_core::observe::record_transition(next.as_str());
        Self::from_row(&row)
    }
}

/// Current view-schema version, a single-row table
pub struct PostgresVersionStore {
    config: StoreConfig,
}

impl PostgresVersionStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self { config };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let table = &self.config.versions_table;
        let mut client = PostgresStore::connect_with(&self.config)?;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY CHECK (id = 0),
                    version INTEGER NOT NULL,
                    online_xact_watermark BIGINT
                );
                INSERT INTO {table} (id, version) VALUES (0, 0)
                    ON CONFLICT (id) DO NOTHING;"
            ))
            .map_err(pg_err)?;
        Ok(())
    }
}

impl VersionStore for PostgresVersionStore {
    fn current_version(&self) -> Result<Version> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!("SELECT version FROM {} WHERE id = 0", self.config.versions_table);
        let row = client.query_one(sql.as_str(), &[]).map_err(pg_err)?;
        Ok(row.get::<_, i32>(0) as Version)
    }

    fn set_current_version(&self, version: Version) -> Result<()> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!("UPDATE {} SET version = $1 WHERE id = 0", self.config.versions_table);
        client
            .execute(sql.as_str(), &[&(version as i32)])
            .map_err(pg_err)?;
        Ok(())
    }

    fn online_watermark(&self) -> Result<Option<i64>> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!(
            "SELECT online_xact_watermark FROM {} WHERE id = 0",
            self.config.versions_table
        );
        let row = client.query_one(sql.as_str(), &[]).map_err(pg_err)?;
        Ok(row.get(0))
    }

    fn set_online_watermark(&self, xact_id: Option<i64>) -> Result<()> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!(
            "UPDATE {} SET online_xact_watermark = $1 WHERE id = 0",
            self.config.versions_table
        );
        client.execute(sql.as_str(), &[&xact_id]).map_err(pg_err)?;
        Ok(())
    }
}
