//! Tests for plan computation

mod common;

use common::projector;
use umbra::prelude::*;
use umbra::testing::MemoryCatalog;

fn catalog_with_accounts_alters() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_replay_table("accounts", "CREATE TABLE accounts%SUFFIX% ()")
        .with_alter_table("accounts", 2, "ALTER TABLE accounts ADD COLUMN note text")
        .with_alter_table("accounts", 4, "ALTER TABLE accounts ADD COLUMN tag text")
}

#[test]
fn test_consecutive_replays_collapse_to_highest_version() {
    let set = MigrationSet::new()
        .declare(1, vec![MigrationTarget::Projector(projector())])
        .declare(2, vec![MigrationTarget::Projector(projector())]);
    let catalog = MemoryCatalog::new();

    let plan = Planner::new(&set, &catalog).plan(0, 2).unwrap();

    let replays: Vec<_> = plan.replay_tables().collect();
    assert_eq!(replays.len(), 1);
    assert_eq!(replays[0].table, "accounts");
    assert_eq!(replays[0].version, 2);
    assert_eq!(plan.projector_names(), vec!["AccountProjector"]);
}

#[test]
fn test_later_replay_supersedes_earlier_alter() {
    let set = MigrationSet::new()
        .declare(2, vec![MigrationTarget::AlterTable("accounts".into())])
        .declare(3, vec![MigrationTarget::Projector(projector())]);

    let plan = Planner::new(&set, &catalog_with_accounts_alters())
        .plan(0, 3)
        .unwrap();

    assert_eq!(plan.migrations.len(), 1);
    assert_eq!(plan.migrations[0].kind, MigrationKind::ReplayTable);
    assert_eq!(plan.migrations[0].version, 3);
}

#[test]
fn test_alter_after_replay_survives() {
    let set = MigrationSet::new()
        .declare(3, vec![MigrationTarget::Projector(projector())])
        .declare(4, vec![MigrationTarget::AlterTable("accounts".into())]);

    let plan = Planner::new(&set, &catalog_with_accounts_alters())
        .plan(0, 4)
        .unwrap();

    assert_eq!(plan.migrations.len(), 2);
    // Ascending version order: the replay precedes the alter
    assert_eq!(plan.migrations[0].kind, MigrationKind::ReplayTable);
    assert_eq!(plan.migrations[0].version, 3);
    assert_eq!(plan.migrations[1].kind, MigrationKind::AlterTable);
    assert_eq!(plan.migrations[1].version, 4);
}

#[test]
fn test_missing_alter_artifact_fails_fast() {
    let set = MigrationSet::new().declare(7, vec![MigrationTarget::AlterTable("accounts".into())]);
    let catalog = MemoryCatalog::new();

    let err = Planner::new(&set, &catalog).plan(0, 7).unwrap_err();
    assert!(matches!(err, UmbraError::MissingMigrationArtifact(_)));
}

#[test]
fn test_version_window_is_half_open() {
    let set = MigrationSet::new()
        .declare(1, vec![MigrationTarget::Projector(projector())])
        .declare(2, vec![MigrationTarget::AlterTable("accounts".into())]);
    let catalog = catalog_with_accounts_alters();
    let planner = Planner::new(&set, &catalog);

    // Version 1 is outside (1, 2]: only the alter remains
    let plan = planner.plan(1, 2).unwrap();
    assert_eq!(plan.migrations.len(), 1);
    assert_eq!(plan.migrations[0].kind, MigrationKind::AlterTable);
    assert!(plan.projectors.is_empty());

    // Equal bounds plan nothing
    assert!(planner.plan(2, 2).unwrap().is_empty());

    // Downgrades are a planning error
    assert!(matches!(
        planner.plan(2, 1),
        Err(UmbraError::Planning(_))
    ));
}

#[test]
fn test_duplicate_alters_deduplicate() {
    let set = MigrationSet::new().declare(
        2,
        vec![
            MigrationTarget::AlterTable("accounts".into()),
            MigrationTarget::AlterTable("accounts".into()),
        ],
    );

    let plan = Planner::new(&set, &catalog_with_accounts_alters())
        .plan(0, 2)
        .unwrap();
    assert_eq!(plan.migrations.len(), 1);
}
