//! PostgreSQL implementations of the Umbra trait seams.
//!
//! Everything the engine needs from the backing store maps onto native
//! PostgreSQL features: shadow tables are `CREATE TABLE (LIKE ... INCLUDING
//! ALL)` copies in a separate schema, replay state transitions lock their
//! row with `FOR NO KEY UPDATE`, the single-active-run rule is a partial
//! unique index, watermarks come from `pg_current_snapshot()`, and large
//! flushes stream through `COPY ... FROM STDIN`.

pub mod event_source;
pub mod replay_states;
pub mod schema;
pub mod sink;
pub mod store;

pub use event_source::PostgresEventSource;
pub use replay_states::{PostgresReplayStateStore, PostgresVersionStore};
pub use schema::PostgresSchema;
pub use sink::PostgresSink;
pub use store::PostgresStore;

use umbra_core::UmbraError;

/// Wrap a driver error the way the core error type expects
pub(crate) fn pg_err(error: postgres::Error) -> UmbraError {
    UmbraError::Storage(error.to_string())
}
