//! Plan computation.
//!
//! Applications declare, per view-schema version, which projectors get
//! their tables rebuilt and which tables are altered in place. The planner
//! diffs two versions into an ordered, deduplicated [`Plan`] without
//! touching the store: redundant work is dropped up front, and a missing
//! alter script fails the plan before any data is involved.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::{Projector, SqlCatalog};
use umbra_core::types::{MigrationKind, Plan, TableMigration, Version};

/// One declared target at a version
#[derive(Clone)]
pub enum MigrationTarget {
    /// Rebuild every table the projector manages
    Projector(Arc<dyn Projector>),
    /// Alter a table in place via its versioned SQL script
    AlterTable(String),
}

impl fmt::Debug for MigrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationTarget::Projector(p) => write!(f, "Projector({})", p.name()),
            MigrationTarget::AlterTable(table) => write!(f, "AlterTable({table})"),
        }
    }
}

/// Ordered declaration of targets per version
#[derive(Debug, Default)]
pub struct MigrationSet {
    versions: std::collections::BTreeMap<Version, Vec<MigrationTarget>>,
}

impl MigrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, version: Version, targets: Vec<MigrationTarget>) -> Self {
        self.versions.entry(version).or_default().extend(targets);
        self
    }

    pub fn latest_version(&self) -> Version {
        self.versions.keys().next_back().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn range(
        &self,
        old: Version,
        new: Version,
    ) -> impl Iterator<Item = (&Version, &Vec<MigrationTarget>)> {
        self.versions
            .range((Bound::Excluded(old), Bound::Included(new)))
    }
}

/// Computes the minimal ordered change set between two versions
pub struct Planner<'a> {
    set: &'a MigrationSet,
    catalog: &'a dyn SqlCatalog,
}

impl<'a> Planner<'a> {
    pub fn new(set: &'a MigrationSet, catalog: &'a dyn SqlCatalog) -> Self {
        Self { set, catalog }
    }

    /// Diff `(old, new]` into a plan.
    ///
    /// - A projector target expands into one `ReplayTable` migration per
    ///   managed table at that version.
    /// - An alter target requires its SQL artifact to exist — fail fast
    ///   otherwise.
    /// - Of consecutive replays of one table only the highest-versioned
    ///   survives, and it supersedes any earlier-or-equal alter of the
    ///   same table: a full rebuild makes them moot.
    pub fn plan(&self, old: Version, new: Version) -> Result<Plan> {
        if new < old {
            return Err(UmbraError::Planning(format!(
                "cannot plan from version {old} down to {new}"
            )));
        }
        if new == old {
            return Ok(Plan::default());
        }

        let mut migrations: Vec<TableMigration> = Vec::new();
        let mut projectors: Vec<Arc<dyn Projector>> = Vec::new();

        for (&version, targets) in self.set.range(old, new) {
            for target in targets {
                match target {
                    MigrationTarget::Projector(projector) => {
                        if !projectors.iter().any(|p| p.name() == projector.name()) {
                            projectors.push(projector.clone());
                        }
                        for table in projector.managed_tables() {
                            migrations.push(TableMigration::new(
                                MigrationKind::ReplayTable,
                                table.name,
                                version,
                            ));
                        }
                    }
                    MigrationTarget::AlterTable(table) => {
                        if !self.catalog.has_alter_table_sql(table, version) {
                            return Err(UmbraError::MissingMigrationArtifact(format!(
                                "no alter script for table '{table}' at version {version}"
                            )));
                        }
                        migrations.push(TableMigration::new(
                            MigrationKind::AlterTable,
                            table.clone(),
                            version,
                        ));
                    }
                }
            }
        }

        // Highest-versioned replay per table wins
        let mut latest_replay: HashMap<String, Version> = HashMap::new();
        for m in migrations.iter().filter(|m| m.kind == MigrationKind::ReplayTable) {
            let entry = latest_replay.entry(m.table.clone()).or_insert(m.version);
            *entry = (*entry).max(m.version);
        }

        migrations.retain(|m| match m.kind {
            MigrationKind::ReplayTable => latest_replay[&m.table] == m.version,
            // A later-or-equal full replay makes the alteration moot
            MigrationKind::AlterTable => latest_replay
                .get(&m.table)
                .map_or(true, |&replay_version| replay_version < m.version),
        });

        let mut seen = HashSet::new();
        migrations.retain(|m| seen.insert((m.kind, m.table.clone(), m.version)));

        Ok(Plan {
            projectors,
            migrations,
        })
    }
}
