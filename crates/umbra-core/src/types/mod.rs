pub mod group;
pub mod migration;
pub mod replay_state;
pub mod table;
pub mod value;

pub use group::{Group, GroupEndpoint};
pub use migration::{version_suffix, MigrationKind, Plan, TableMigration, Version};
pub use replay_state::{ReplayPhase, ReplayState};
pub use table::{ColumnSpec, TableSpec};
pub use value::{ColumnType, Row, Value};
