//! Tests for two-phase plan execution

mod common;

use common::projector;
use umbra::prelude::*;
use umbra::testing::{MemoryCatalog, MemorySchema};

fn plan_for_accounts(catalog: &MemoryCatalog) -> Plan {
    let set = MigrationSet::new()
        .declare(2, vec![MigrationTarget::Projector(projector())])
        .declare(3, vec![MigrationTarget::AlterTable("totals".into())]);
    Planner::new(&set, catalog).plan(0, 3).unwrap()
}

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_replay_table(
            "accounts",
            "CREATE TABLE accounts%SUFFIX% (aggregate_id uuid, balance bigint);\n\
             CREATE UNIQUE INDEX accounts_agg%SUFFIX% ON accounts%SUFFIX% (aggregate_id);",
        )
        .with_alter_table("totals", 3, "ALTER TABLE totals ADD COLUMN day date")
}

#[test]
fn test_online_creates_suffixed_tables_and_rebinds() {
    let catalog = catalog();
    let schema = MemorySchema::new();
    let tables = TableRegistry::new();
    let plan = plan_for_accounts(&catalog);

    Executor::new(&schema, &catalog, &tables)
        .execute_online(&plan, 2)
        .unwrap();

    let statements = schema.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].contains("CREATE TABLE accounts_2"));
    assert!(statements[0].contains("accounts_agg_2 ON accounts_2"));
    assert!(!statements[0].contains("%SUFFIX%"));
    assert_eq!(tables.physical("accounts"), "accounts_2");
}

#[test]
fn test_offline_swaps_and_alters_in_one_batch() {
    let catalog = catalog();
    // The canonical table exists from the previous version
    let schema = MemorySchema::new().with_table("accounts", 10);
    let tables = TableRegistry::new();
    let plan = plan_for_accounts(&catalog);

    tables.set_table_names_to_new_version(&plan, 2);
    Executor::new(&schema, &catalog, &tables)
        .execute_offline(&plan, 1, 2)
        .unwrap();

    let statements = schema.statements();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE accounts RENAME TO accounts_1".to_string(),
            "ALTER TABLE accounts_2 RENAME TO accounts".to_string(),
            "ALTER TABLE totals ADD COLUMN day date".to_string(),
        ]
    );
    // Bindings point at canonical names again
    assert_eq!(tables.physical("accounts"), "accounts");
}

#[test]
fn test_offline_first_migration_has_no_previous_table() {
    let catalog = catalog();
    let schema = MemorySchema::new();
    let tables = TableRegistry::new();
    let plan = plan_for_accounts(&catalog);

    Executor::new(&schema, &catalog, &tables)
        .execute_offline(&plan, 0, 2)
        .unwrap();

    let statements = schema.statements();
    assert!(statements
        .iter()
        .all(|s| !s.contains("RENAME TO accounts_0")));
    assert!(statements
        .iter()
        .any(|s| s == "ALTER TABLE accounts_2 RENAME TO accounts"));
}

#[test]
fn test_abort_online_drops_new_tables_and_resets() {
    let catalog = catalog();
    let schema = MemorySchema::new();
    let tables = TableRegistry::new();
    let plan = plan_for_accounts(&catalog);

    let executor = Executor::new(&schema, &catalog, &tables);
    executor.execute_online(&plan, 2).unwrap();
    assert_eq!(tables.physical("accounts"), "accounts_2");

    executor.abort_online(&plan, 2).unwrap();
    assert!(schema
        .statements()
        .iter()
        .any(|s| s == "DROP TABLE IF EXISTS accounts_2 CASCADE"));
    assert_eq!(tables.physical("accounts"), "accounts");
}
