//! Optional metrics instrumentation for Umbra.
//!
//! When the `observe` feature is enabled, key operations emit counters,
//! histograms, and gauges via the [`metrics`] crate. A downstream
//! application must install a metrics recorder (e.g. `metrics-exporter-prometheus`)
//! to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record one replayed group (counter + latency histogram + event count).
///
/// - `umbra.replay.groups_total` – incremented per completed group
/// - `umbra.replay.group_duration_seconds` – histogram of group latency
/// - `umbra.replay.events_total` – counter of replayed events
#[inline]
pub fn record_group_replayed(duration: std::time::Duration, events: u64) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("umbra.replay.groups_total").increment(1);
        metrics::histogram!("umbra.replay.group_duration_seconds").record(duration.as_secs_f64());
        metrics::counter!("umbra.replay.events_total").increment(events);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (duration, events);
    }
}

/// Record a persistor flush.
///
/// - `umbra.persistor.flushes_total` – counter with `mode` label (`copy` / `insert`)
/// - `umbra.persistor.rows_flushed_total` – counter
#[inline]
pub fn record_flush(rows: u64, bulk: bool) {
    #[cfg(feature = "observe")]
    {
        let mode = if bulk { "copy" } else { "insert" };
        metrics::counter!("umbra.persistor.flushes_total", "mode" => mode).increment(1);
        metrics::counter!("umbra.persistor.rows_flushed_total").increment(rows);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (rows, bulk);
    }
}

/// Record a replay state transition.
///
/// - `umbra.replay_state.transitions_total` – counter with `to` label
#[inline]
pub fn record_transition(to: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("umbra.replay_state.transitions_total", "to" => to).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = to;
    }
}

/// Record a failed replay run.
///
/// - `umbra.replay.failures_total` – counter
#[inline]
pub fn record_replay_failure() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("umbra.replay.failures_total").increment(1);
    }
}
