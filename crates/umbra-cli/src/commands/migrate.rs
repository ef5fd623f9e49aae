//! Migration command implementations

use crate::MigrateCommands;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use umbra::{
    BulkSink, DirSqlCatalog, MigrationKind, MigrationSet, Migrator, PostgresStore, ReplayConfig,
};

pub fn execute(
    store: &PostgresStore,
    migrations: MigrationSet,
    migrations_dir: &Path,
    command: MigrateCommands,
) -> Result<()> {
    if migrations.is_empty() {
        bail!(
            "no declared migration versions; `migrate` commands require an \
             application binary embedding CliApp with its MigrationSet"
        );
    }
    let migrator = build_migrator(store, migrations, migrations_dir)?;

    match command {
        MigrateCommands::Plan { to } => plan(&migrator, to),
        MigrateCommands::Online { to } => online(&migrator, to),
        MigrateCommands::Offline { to } => offline(&migrator, to),
    }
}

fn build_migrator(
    store: &PostgresStore,
    migrations: MigrationSet,
    migrations_dir: &Path,
) -> Result<Migrator> {
    let sink_store = store.clone();
    Ok(Migrator::new(
        migrations,
        Arc::new(DirSqlCatalog::new(migrations_dir)),
        Arc::new(store.schema_applier()),
        Arc::new(store.event_source()),
        Arc::new(store.versions().context("Failed to open version store")?),
        Arc::new(move || Ok(Arc::new(sink_store.sink()?) as Arc<dyn BulkSink>)),
        ReplayConfig::default(),
    ))
}

fn target(migrator: &Migrator, to: Option<u32>) -> u32 {
    to.unwrap_or_else(|| migrator.latest_version())
}

fn plan(migrator: &Migrator, to: Option<u32>) -> Result<()> {
    let to = target(migrator, to);
    let current = migrator
        .current_version()
        .context("Failed to read current version")?;
    let plan = migrator.plan_to(to).context("Failed to compute plan")?;

    if plan.is_empty() {
        println!("Nothing to migrate: already at version {current}");
        return Ok(());
    }

    println!("\nMigrating v{current} -> v{to}:");
    println!("{:<10} {:<14} Table", "Version", "Kind");
    println!("{}", "=".repeat(50));
    for migration in &plan.migrations {
        let kind = match migration.kind {
            MigrationKind::ReplayTable => "replay",
            MigrationKind::AlterTable => "alter",
        };
        println!("{:<10} {:<14} {}", migration.version, kind, migration.table);
    }
    println!(
        "\n{} migration(s), {} projector(s) to replay",
        plan.migrations.len(),
        plan.projectors.len()
    );
    Ok(())
}

fn online(migrator: &Migrator, to: Option<u32>) -> Result<()> {
    let to = target(migrator, to);
    println!("Running online migration to v{to}...");
    let stats = migrator
        .migrate_online(to)
        .context("Online migration failed")?;
    println!(
        "✓ Online phase complete: {} events replayed across {} groups in {:?}",
        stats.events_replayed, stats.groups, stats.duration
    );
    println!("Run `migrate offline --to {to}` to activate the new version");
    Ok(())
}

fn offline(migrator: &Migrator, to: Option<u32>) -> Result<()> {
    let to = target(migrator, to);
    println!("Running offline migration to v{to}...");
    migrator
        .migrate_offline(to)
        .context("Offline migration failed")?;
    println!("✓ View schema is now at version {to}");
    Ok(())
}
