//! Replay run recovery commands

use anyhow::{Context, Result};
use std::io::{self, Write};
use umbra::{PostgresStore, ReplayPhase, ReplayStateStore, SchemaApplier, StateUpdate};

pub fn abort(store: &PostgresStore, force: bool) -> Result<()> {
    let states = store
        .replay_states()
        .context("Failed to open replay state store")?;
    let Some(run) = states.active().context("Failed to read replay state")? else {
        println!("No active replay run to abort");
        return Ok(());
    };

    if !force {
        print!(
            "Abort replay run {} (state '{}') and drop schema '{}'? [y/N] ",
            run.id,
            run.state,
            store.config().shadow_schema
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Abort cancelled");
            return Ok(());
        }
    }

    states
        .transition(
            run.id,
            ReplayPhase::NON_TERMINAL,
            ReplayPhase::Aborted,
            StateUpdate::default(),
        )
        .context("Failed to abort replay run")?;
    store
        .schema_applier()
        .drop_schema(&store.config().shadow_schema)
        .context("Failed to drop shadow schema")?;

    println!("✓ Replay run {} aborted", run.id);
    Ok(())
}
