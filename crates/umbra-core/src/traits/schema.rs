use crate::error::Result;
use crate::types::Version;

/// Placeholder substituted with a version suffix in replay-table DDL, so
/// table/index/constraint names stay unique across versions
pub const SUFFIX_PLACEHOLDER: &str = "%SUFFIX%";

pub fn substitute_suffix(sql: &str, suffix: &str) -> String {
    sql.replace(SUFFIX_PLACEHOLDER, suffix)
}

/// Applies DDL to the backing store
pub trait SchemaApplier: Send + Sync {
    /// Execute a SQL script (possibly multiple statements)
    fn exec_sql(&self, sql: &str) -> Result<()>;

    /// Execute a list of statements inside a single transaction
    fn exec_batch(&self, statements: &[String]) -> Result<()>;

    fn table_exists(&self, table: &str) -> Result<bool>;

    fn row_count(&self, table: &str) -> Result<u64>;

    fn truncate_table(&self, table: &str) -> Result<()>;

    fn create_schema(&self, name: &str) -> Result<()>;

    fn drop_schema(&self, name: &str) -> Result<()>;

    /// Create an empty structural copy (`LIKE source INCLUDING ALL`)
    fn create_table_like(&self, source: &str, target: &str) -> Result<()>;
}

/// Locates the versioned SQL artifacts a plan executes.
///
/// Replay-table DDL lives under the table's name and carries the
/// [`SUFFIX_PLACEHOLDER`]; alter scripts are versioned per table.
pub trait SqlCatalog: Send + Sync {
    /// DDL that creates a table (and its indexes/constraints), with
    /// `%SUFFIX%` placeholders
    fn replay_table_sql(&self, table: &str) -> Result<String>;

    /// Versioned in-place alteration script for a table
    fn alter_table_sql(&self, table: &str, version: Version) -> Result<String>;

    /// Whether an alter script exists; consulted by the planner's
    /// fail-fast check before any data is touched
    fn has_alter_table_sql(&self, table: &str, version: Version) -> bool;
}
