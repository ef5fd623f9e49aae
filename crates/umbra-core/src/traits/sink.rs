use crate::error::Result;
use crate::types::Value;

/// How a table's batch reaches storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Bulk columnar load (CSV text through the store's bulk-import
    /// protocol); chosen for large batches
    Copy,
    /// Single parameterized multi-row insert; chosen for small batches
    Insert,
}

/// All buffered rows of one table, ready to flush
#[derive(Debug, Clone)]
pub struct TableFlush {
    /// Physical table name (may be schema-qualified or version-suffixed)
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub mode: FlushMode,
}

impl TableFlush {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Storage side of a persistor commit.
///
/// `flush` writes every batch inside one transaction: a group's commit is
/// all-or-nothing.
pub trait BulkSink: Send + Sync {
    fn flush(&self, batches: &[TableFlush]) -> Result<()>;
}
