//! Status command implementation

use anyhow::{Context, Result};
use umbra::{PostgresStore, ReplayStateStore, VersionStore};

pub fn execute(store: &PostgresStore) -> Result<()> {
    let versions = store.versions().context("Failed to open version store")?;
    let current = versions
        .current_version()
        .context("Failed to read current version")?;
    println!("View schema version: {current}");

    if let Some(watermark) = versions
        .online_watermark()
        .context("Failed to read online watermark")?
    {
        println!("Online phase watermark: {watermark} (offline phase pending)");
    }

    let states = store
        .replay_states()
        .context("Failed to open replay state store")?;
    match states.active().context("Failed to read replay state")? {
        None => println!("No active replay run"),
        Some(run) => {
            println!("\nActive replay run:");
            println!("  id:         {}", run.id);
            println!("  state:      {}", run.state);
            println!("  projectors: {}", run.projector_names.join(", "));
            if let Some(watermark) = run.continue_replay_at_xact_id {
                println!("  watermark:  {watermark}");
            }
            println!("  created at: {}", run.created_at);
            println!("  updated at: {}", run.updated_at);
        }
    }

    Ok(())
}
