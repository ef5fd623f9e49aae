pub mod event_source;
pub mod persistor;
pub mod projector;
pub mod replay_store;
pub mod schema;
pub mod sink;

pub use event_source::{EventFilter, EventSource, StoredEvent};
pub use persistor::{Persistor, RecordId};
pub use projector::{Projector, ProjectorRegistry};
pub use replay_store::{ReplayStateStore, StateUpdate, VersionStore};
pub use schema::{substitute_suffix, SchemaApplier, SqlCatalog, SUFFIX_PLACEHOLDER};
pub use sink::{BulkSink, FlushMode, TableFlush};
