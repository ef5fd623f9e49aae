use crate::error::Result;
use crate::types::Row;

/// Identity of a buffered record.
///
/// Two records with identical column values are still distinct records;
/// identity is the arena index assigned at creation, not value equality.
pub type RecordId = u64;

/// Write interface projectors use during replay.
///
/// Implementations buffer mutations in memory per logical table and flush
/// them on `commit`; nothing reaches storage before that.
pub trait Persistor {
    /// Allocate a new record, merging the table's column defaults with the
    /// given values
    fn create_record(&mut self, table: &str, values: Row) -> Result<RecordId>;

    /// Records matching the where-clause. Uses an index when the clause's
    /// column set exactly matches a declared index tuple, otherwise scans.
    fn find_records(&self, table: &str, where_clause: &Row) -> Vec<RecordId>;

    /// Like `find_records` but the record must exist; the error spells out
    /// the where-clause and the table's current contents
    fn get_record(&self, table: &str, where_clause: &Row) -> Result<RecordId>;

    /// Current column values of a record
    fn record(&self, table: &str, id: RecordId) -> Option<Row>;

    /// Apply updates to one record, keeping indexes consistent
    fn update_record(&mut self, table: &str, id: RecordId, updates: Row) -> Result<()>;

    /// Update every record matching the where-clause; returns how many
    fn update_all_records(&mut self, table: &str, where_clause: &Row, updates: Row)
        -> Result<usize>;

    /// Remove one record
    fn delete_record(&mut self, table: &str, id: RecordId) -> Result<()>;

    /// Remove every record matching the where-clause; returns how many
    fn delete_all_records(&mut self, table: &str, where_clause: &Row) -> Result<usize>;

    /// Flush all buffered records to storage in one transaction and clear
    /// the buffer. Calling again without new writes is a no-op.
    fn commit(&mut self) -> Result<()>;
}
