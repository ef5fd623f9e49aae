//! Logical-to-physical table name bindings.
//!
//! During a migration the application keeps addressing tables by their
//! logical names while the physical tables move through suffixed and
//! canonical incarnations. The registry is the single in-memory source of
//! that mapping; the executor repoints it, replay flushes read it.

use parking_lot::RwLock;
use std::collections::HashMap;
use umbra_core::types::{version_suffix, Plan, Version};

#[derive(Default)]
pub struct TableRegistry {
    bindings: RwLock<HashMap<String, String>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tables: impl IntoIterator<Item = String>) {
        let mut bindings = self.bindings.write();
        for table in tables {
            bindings.entry(table.clone()).or_insert(table);
        }
    }

    /// Physical name currently bound to a logical table; unbound names map
    /// to themselves
    pub fn physical(&self, logical: &str) -> String {
        self.bindings
            .read()
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_string())
    }

    pub fn bind_suffixed(&self, logical: &str, version: Version) {
        let physical = format!("{logical}{}", version_suffix(version));
        self.bindings.write().insert(logical.to_string(), physical);
    }

    /// Point every binding back at its canonical name (rollback, or after
    /// the offline swap made the canonical names real again)
    pub fn reset_table_names(&self) {
        let mut bindings = self.bindings.write();
        for (logical, physical) in bindings.iter_mut() {
            *physical = logical.clone();
        }
    }

    /// Point the plan's replay tables at their suffixed incarnations;
    /// used to re-enter a partially completed migration
    pub fn set_table_names_to_new_version(&self, plan: &Plan, version: Version) {
        for migration in plan.replay_tables() {
            self.bind_suffixed(&migration.table, version);
        }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.bindings.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_default_to_logical_names() {
        let registry = TableRegistry::new();
        registry.register(["accounts".to_string()]);
        assert_eq!(registry.physical("accounts"), "accounts");
        assert_eq!(registry.physical("unknown"), "unknown");
    }

    #[test]
    fn test_suffix_and_reset() {
        let registry = TableRegistry::new();
        registry.register(["accounts".to_string()]);
        registry.bind_suffixed("accounts", 4);
        assert_eq!(registry.physical("accounts"), "accounts_4");
        registry.reset_table_names();
        assert_eq!(registry.physical("accounts"), "accounts");
    }
}
