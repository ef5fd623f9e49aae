//! Plan execution in two phases.
//!
//! The online phase only ever creates new, suffixed objects — nothing the
//! running application reads is touched. The offline phase performs the
//! visible swap: a two-step rename that keeps the previous table around for
//! rollback, plus the in-place alterations, all emitted as one statement
//! batch the schema applier runs in a single transaction.

use crate::tables::TableRegistry;
use umbra_core::error::Result;
use umbra_core::traits::{substitute_suffix, SchemaApplier, SqlCatalog};
use umbra_core::types::{version_suffix, Plan, Version};

pub struct Executor<'a> {
    schema: &'a dyn SchemaApplier,
    catalog: &'a dyn SqlCatalog,
    tables: &'a TableRegistry,
}

impl<'a> Executor<'a> {
    pub fn new(
        schema: &'a dyn SchemaApplier,
        catalog: &'a dyn SqlCatalog,
        tables: &'a TableRegistry,
    ) -> Self {
        Self {
            schema,
            catalog,
            tables,
        }
    }

    /// Create the suffixed replay tables and bind the logical names to
    /// them. Safe while the application runs: only new objects appear.
    pub fn execute_online(&self, plan: &Plan, new_version: Version) -> Result<()> {
        let suffix = version_suffix(new_version);
        for migration in plan.replay_tables() {
            tracing::info!(table = %migration.table, version = new_version, "creating replay table");
            let sql = self.catalog.replay_table_sql(&migration.table)?;
            self.schema.exec_sql(&substitute_suffix(&sql, &suffix))?;
            self.tables.bind_suffixed(&migration.table, new_version);
        }
        Ok(())
    }

    /// Swap the replayed tables into place and apply in-place alterations.
    ///
    /// Runs as one transactional batch. Renames are two-step — canonical to
    /// previous-version suffix, new suffix to canonical — so nothing is
    /// dropped and rollback stays possible.
    pub fn execute_offline(
        &self,
        plan: &Plan,
        current_version: Version,
        new_version: Version,
    ) -> Result<()> {
        let mut statements = Vec::new();
        for migration in plan.replay_tables() {
            let table = &migration.table;
            if self.schema.table_exists(table)? {
                statements.push(format!(
                    "ALTER TABLE {table} RENAME TO {table}{}",
                    version_suffix(current_version)
                ));
            }
            statements.push(format!(
                "ALTER TABLE {table}{} RENAME TO {table}",
                version_suffix(new_version)
            ));
        }
        for migration in plan.alter_tables() {
            tracing::info!(table = %migration.table, version = migration.version, "altering table");
            statements.push(self.catalog.alter_table_sql(&migration.table, migration.version)?);
        }

        self.schema.exec_batch(&statements)?;
        self.tables.reset_table_names();
        Ok(())
    }

    /// Rollback of a failed online phase: drop the suffixed tables and
    /// repoint the bindings at the live schema
    pub fn abort_online(&self, plan: &Plan, new_version: Version) -> Result<()> {
        for migration in plan.replay_tables() {
            self.schema.exec_sql(&format!(
                "DROP TABLE IF EXISTS {}{} CASCADE",
                migration.table,
                version_suffix(new_version)
            ))?;
        }
        self.tables.reset_table_names();
        Ok(())
    }
}
