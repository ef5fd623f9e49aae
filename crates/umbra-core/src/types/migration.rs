use crate::traits::projector::Projector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// View-schema version identifier
pub type Version = u32;

/// Suffix appended to physical table names created for a version
pub fn version_suffix(version: Version) -> String {
    format!("_{version}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    /// Apply a versioned SQL script to the canonical table in place
    AlterTable,
    /// Create a fresh suffixed table and rebuild it from the event log
    ReplayTable,
}

/// One schema change for one table at one version.
///
/// Equality and hashing consider `(table, version)` only; a replay and an
/// alter of the same table at the same version describe the same slot in a
/// plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMigration {
    pub kind: MigrationKind,
    pub table: String,
    pub version: Version,
}

impl TableMigration {
    pub fn new(kind: MigrationKind, table: impl Into<String>, version: Version) -> Self {
        Self {
            kind,
            table: table.into(),
            version,
        }
    }
}

impl PartialEq for TableMigration {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.version == other.version
    }
}

impl Eq for TableMigration {}

impl Hash for TableMigration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.version.hash(state);
    }
}

/// An ordered, deduplicated set of schema changes between two versions,
/// plus the projectors whose tables get rebuilt.
///
/// Invariants (established by the planner):
/// - migrations are in ascending version order;
/// - for each table at most one `ReplayTable` migration survives, at the
///   highest declared version;
/// - no `AlterTable` migration survives for a table that also has a
///   `ReplayTable` migration at an equal or later version.
#[derive(Clone, Default)]
pub struct Plan {
    pub projectors: Vec<Arc<dyn Projector>>,
    pub migrations: Vec<TableMigration>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn replay_tables(&self) -> impl Iterator<Item = &TableMigration> {
        self.migrations
            .iter()
            .filter(|m| m.kind == MigrationKind::ReplayTable)
    }

    pub fn alter_tables(&self) -> impl Iterator<Item = &TableMigration> {
        self.migrations
            .iter()
            .filter(|m| m.kind == MigrationKind::AlterTable)
    }

    pub fn projector_names(&self) -> Vec<String> {
        self.projectors.iter().map(|p| p.name().to_string()).collect()
    }
}

// Projector handles are not Debug; render their names instead.
impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("projectors", &self.projector_names())
            .field("migrations", &self.migrations)
            .finish()
    }
}
