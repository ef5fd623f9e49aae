use crate::{
    pg_err, PostgresEventSource, PostgresReplayStateStore, PostgresSchema, PostgresSink,
    PostgresVersionStore,
};
use postgres::{Client, NoTls};
use umbra_core::error::Result;
use umbra_core::StoreConfig;

/// Entry point to the PostgreSQL backends.
///
/// Holds only configuration; every backend handed out opens connections on
/// demand, so replay workers on other threads each end up with their own
/// connection rather than sharing one across a fork/spawn boundary.
#[derive(Clone)]
pub struct PostgresStore {
    config: StoreConfig,
}

impl PostgresStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn connect_with(config: &StoreConfig) -> Result<Client> {
        Client::connect(&config.url, NoTls).map_err(pg_err)
    }

    pub fn connect(&self) -> Result<Client> {
        Self::connect_with(&self.config)
    }

    pub fn event_source(&self) -> PostgresEventSource {
        PostgresEventSource::new(self.config.clone())
    }

    /// Replay state store; creates its table and the single-active-run
    /// partial unique index on first use
    pub fn replay_states(&self) -> Result<PostgresReplayStateStore> {
        PostgresReplayStateStore::open(self.config.clone())
    }

    /// Version store; creates its single-row table on first use
    pub fn versions(&self) -> Result<PostgresVersionStore> {
        PostgresVersionStore::open(self.config.clone())
    }

    pub fn schema_applier(&self) -> PostgresSchema {
        PostgresSchema::new(self.config.clone())
    }

    /// A bulk sink with its own connection; build one per replay worker
    pub fn sink(&self) -> Result<PostgresSink> {
        PostgresSink::connect(&self.config)
    }
}
