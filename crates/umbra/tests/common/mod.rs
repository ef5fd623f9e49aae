//! Shared fixtures: a small account projector and event builders.

use std::sync::Arc;
use umbra::prelude::*;
use umbra_core::row;
use uuid::Uuid;

pub struct AccountProjector;

impl Projector for AccountProjector {
    fn name(&self) -> &str {
        "AccountProjector"
    }

    fn managed_tables(&self) -> Vec<TableSpec> {
        vec![TableSpec::new("accounts")
            .column("aggregate_id", ColumnType::Uuid)
            .column("balance", ColumnType::BigInt)]
    }

    fn message_mapping(&self) -> Vec<String> {
        vec!["account_opened".into(), "deposited".into()]
    }

    fn apply(&self, event: &StoredEvent, persistor: &mut dyn Persistor) -> Result<()> {
        match event.event_type.as_str() {
            "account_opened" => {
                persistor.create_record(
                    "accounts",
                    row! {
                        "aggregate_id" => Value::Uuid(event.aggregate_id),
                        "balance" => Value::Int(0),
                    },
                )?;
            }
            "deposited" => {
                let amount = event
                    .payload
                    .get("amount")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                let id = persistor.get_record(
                    "accounts",
                    &row! { "aggregate_id" => Value::Uuid(event.aggregate_id) },
                )?;
                let balance = match persistor.record("accounts", id).and_then(|r| r.get("balance").cloned()) {
                    Some(Value::Int(balance)) => balance,
                    _ => 0,
                };
                persistor.update_record(
                    "accounts",
                    id,
                    row! { "balance" => Value::Int(balance + amount) },
                )?;
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn projector() -> Arc<dyn Projector> {
    Arc::new(AccountProjector)
}

pub fn opened(partition: &str, aggregate: u128, xact_id: i64) -> StoredEvent {
    StoredEvent {
        partition_key: partition.to_string(),
        aggregate_id: Uuid::from_u128(aggregate),
        sequence_number: 1,
        event_type: "account_opened".into(),
        payload: serde_json::json!({}),
        xact_id,
    }
}

pub fn deposited(
    partition: &str,
    aggregate: u128,
    sequence: i64,
    amount: i64,
    xact_id: i64,
) -> StoredEvent {
    StoredEvent {
        partition_key: partition.to_string(),
        aggregate_id: Uuid::from_u128(aggregate),
        sequence_number: sequence,
        event_type: "deposited".into(),
        payload: serde_json::json!({ "amount": amount }),
        xact_id,
    }
}
