//! Tests for the two-phase migrator

mod common;

use common::{opened, projector};
use std::sync::Arc;
use umbra::prelude::*;
use umbra::testing::{
    shared_sink_factory, MemoryCatalog, MemoryEventSource, MemorySchema, MemorySink,
    MemoryVersionStore,
};

struct Fixture {
    migrator: Migrator,
    schema: Arc<MemorySchema>,
    source: Arc<MemoryEventSource>,
    sink: Arc<MemorySink>,
    versions: Arc<MemoryVersionStore>,
}

fn fixture() -> Fixture {
    let catalog = Arc::new(
        MemoryCatalog::new()
            .with_replay_table("accounts", "CREATE TABLE accounts%SUFFIX% (aggregate_id uuid, balance bigint)"),
    );
    let schema = Arc::new(MemorySchema::new());
    let source = Arc::new(MemoryEventSource::new());
    let sink = Arc::new(MemorySink::new());
    let versions = Arc::new(MemoryVersionStore::new());
    let set = MigrationSet::new().declare(1, vec![MigrationTarget::Projector(projector())]);
    let migrator = Migrator::new(
        set,
        catalog,
        schema.clone(),
        source.clone(),
        versions.clone(),
        shared_sink_factory(sink.clone()),
        ReplayConfig::default().with_worker_count(2),
    );
    Fixture {
        migrator,
        schema,
        source,
        sink,
        versions,
    }
}

#[test]
fn test_online_replays_history_into_suffixed_table() {
    let f = fixture();
    f.source.push(opened("account", 1, 10));
    f.source.push(opened("account", 2, 11));

    let stats = f.migrator.migrate_online(1).unwrap();
    assert_eq!(stats.events_replayed, 2);

    assert!(f
        .schema
        .statements()
        .iter()
        .any(|s| s.contains("CREATE TABLE accounts_1")));
    assert_eq!(f.sink.rows_for("accounts_1").len(), 2);
    assert_eq!(f.migrator.tables().physical("accounts"), "accounts_1");
    // Watermark recorded for the offline catch-up
    assert_eq!(f.versions.online_watermark().unwrap(), Some(12));
    // Version not bumped until the offline phase
    assert_eq!(f.versions.current_version().unwrap(), 0);
}

#[test]
fn test_offline_catches_up_swaps_and_bumps_version() {
    let f = fixture();
    f.source.push(opened("account", 1, 10));
    f.migrator.migrate_online(1).unwrap();

    // An event arrives between the phases
    f.source.push(opened("account", 2, 20));

    f.migrator.migrate_offline(1).unwrap();

    // The delta got replayed into the suffixed table before the swap
    assert_eq!(f.sink.rows_for("accounts_1").len(), 2);
    assert!(f
        .schema
        .statements()
        .iter()
        .any(|s| s == "ALTER TABLE accounts_1 RENAME TO accounts"));
    assert_eq!(f.versions.current_version().unwrap(), 1);
    assert_eq!(f.versions.online_watermark().unwrap(), None);
    assert_eq!(f.migrator.tables().physical("accounts"), "accounts");
}

#[test]
fn test_migrate_to_current_version_is_a_no_op() {
    let f = fixture();
    f.versions.set_current_version(1).unwrap();

    let stats = f.migrator.migrate_online(1).unwrap();
    assert_eq!(stats.events_replayed, 0);
    assert!(f.schema.statements().is_empty());
}
