//! Walk a replay run through its whole lifecycle against the in-memory
//! backends: create, prepare shadow tables, initial replay, an incremental
//! pass after new events arrive, done.
//!
//! Run with: cargo run -p umbra --example shadow_replay

use std::sync::Arc;
use umbra::prelude::*;
use umbra::testing::{
    shared_sink_factory, MemoryEventSource, MemoryReplayStateStore, MemorySchema, MemorySink,
};
use umbra_core::row;
use uuid::Uuid;

struct CounterProjector;

impl Projector for CounterProjector {
    fn name(&self) -> &str {
        "CounterProjector"
    }

    fn managed_tables(&self) -> Vec<TableSpec> {
        vec![TableSpec::new("counters")
            .column("aggregate_id", ColumnType::Uuid)
            .column("total", ColumnType::BigInt)]
    }

    fn message_mapping(&self) -> Vec<String> {
        vec!["counter_created".into()]
    }

    fn apply(&self, event: &StoredEvent, persistor: &mut dyn Persistor) -> Result<()> {
        persistor.create_record(
            "counters",
            row! {
                "aggregate_id" => Value::Uuid(event.aggregate_id),
                "total" => Value::Int(0),
            },
        )?;
        Ok(())
    }
}

fn event(aggregate: u128, xact_id: i64) -> StoredEvent {
    StoredEvent {
        partition_key: "counter".into(),
        aggregate_id: Uuid::from_u128(aggregate),
        sequence_number: 1,
        event_type: "counter_created".into(),
        payload: serde_json::json!({}),
        xact_id,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let states = Arc::new(MemoryReplayStateStore::new());
    let schema = Arc::new(MemorySchema::new());
    let source = Arc::new(MemoryEventSource::new());
    let sink = Arc::new(MemorySink::linked_to(schema.clone()));
    let registry = Arc::new(ProjectorRegistry::from_projectors([
        Arc::new(CounterProjector) as Arc<dyn Projector>,
    ]));

    for i in 0..100i64 {
        source.push(event(i as u128, 10 + i));
    }

    let replayer = ProjectorsReplayer::new(
        states,
        schema,
        source.clone(),
        registry,
        shared_sink_factory(sink.clone()),
        ReplayConfig::default().with_worker_count(4),
        "umbra_shadow",
    );

    replayer.create()?;
    replayer.prepare_for_replay()?;

    let stats = replayer.perform_initial_replay()?;
    println!(
        "initial replay: {} events in {} groups",
        stats.events_replayed, stats.groups
    );

    // Writes keep arriving while the run waits for activation
    source.push(event(100, 200));
    source.push(event(101, 201));

    let stats = replayer.perform_incremental_replay()?;
    println!("incremental replay: {} events", stats.events_replayed);

    replayer.done()?;
    println!(
        "shadow rows flushed: {}",
        sink.rows_for("umbra_shadow.counters").len()
    );
    Ok(())
}
