//! Filesystem SQL catalog.
//!
//! Versioned SQL artifacts live in one directory: `<table>.sql` holds the
//! replay-table DDL (with `%SUFFIX%` placeholders), `<table>_<version>.sql`
//! holds the in-place alteration for that version.

use std::io::ErrorKind;
use std::path::PathBuf;
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::SqlCatalog;
use umbra_core::types::Version;

pub struct DirSqlCatalog {
    root: PathBuf,
}

impl DirSqlCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, file_name: &str) -> Result<String> {
        let path = self.root.join(file_name);
        std::fs::read_to_string(&path).map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                UmbraError::MissingMigrationArtifact(path.display().to_string())
            } else {
                error.into()
            }
        })
    }
}

impl SqlCatalog for DirSqlCatalog {
    fn replay_table_sql(&self, table: &str) -> Result<String> {
        self.read(&format!("{table}.sql"))
    }

    fn alter_table_sql(&self, table: &str, version: Version) -> Result<String> {
        self.read(&format!("{table}_{version}.sql"))
    }

    fn has_alter_table_sql(&self, table: &str, version: Version) -> bool {
        self.root.join(format!("{table}_{version}.sql")).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locates_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("accounts.sql"), "CREATE TABLE accounts%SUFFIX% ()")
            .unwrap();
        std::fs::write(dir.path().join("accounts_3.sql"), "ALTER TABLE accounts ADD x int")
            .unwrap();

        let catalog = DirSqlCatalog::new(dir.path());
        assert!(catalog.replay_table_sql("accounts").unwrap().contains("%SUFFIX%"));
        assert!(catalog.has_alter_table_sql("accounts", 3));
        assert!(!catalog.has_alter_table_sql("accounts", 4));
        assert!(matches!(
            catalog.alter_table_sql("accounts", 4),
            Err(UmbraError::MissingMigrationArtifact(_))
        ));
    }
}
