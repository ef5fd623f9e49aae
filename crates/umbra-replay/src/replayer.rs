//! Parallel event replay.
//!
//! One coordinating call partitions the log into groups and fans each group
//! out to a bounded worker pool. Workers share nothing mutable: each owns
//! its persistor (and thereby its storage connection) and runs its group to
//! completion — cursor read, projector application, one bulk commit. Any
//! worker failure poisons the run; siblings stop at their next event and
//! the first error propagates.

use crate::grouper::group_partitions;
use crate::persistor::OptimizedPersistor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use umbra_core::error::{Result, UmbraError};
use umbra_core::traits::{EventFilter, EventSource, Persistor, ProjectorRegistry};
use umbra_core::types::Group;
use umbra_core::ReplayConfig;

/// Transaction-id bounds of one replay pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayBounds {
    pub xact_id_below: Option<i64>,
    pub xact_id_at_or_above: Option<i64>,
}

impl ReplayBounds {
    pub fn below(xact_id: i64) -> Self {
        Self {
            xact_id_below: Some(xact_id),
            xact_id_at_or_above: None,
        }
    }

    pub fn between(at_or_above: i64, below: i64) -> Self {
        Self {
            xact_id_below: Some(below),
            xact_id_at_or_above: Some(at_or_above),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayStats {
    pub groups: usize,
    pub events_replayed: u64,
    pub duration: Duration,
}

impl ReplayStats {
    fn empty() -> Self {
        Self {
            groups: 0,
            events_replayed: 0,
            duration: Duration::from_secs(0),
        }
    }
}

/// Builds one persistor per worker; the persistor owns that worker's sink
/// connection
pub type PersistorFactory<'a> = dyn Fn() -> Result<OptimizedPersistor> + Sync + 'a;

/// Fans replay of the whole event log (within transaction-id bounds) out to
/// a worker pool over disjoint key-range groups.
pub struct ParallelReplayer<'a> {
    source: &'a dyn EventSource,
    registry: &'a ProjectorRegistry,
    config: ReplayConfig,
}

impl<'a> ParallelReplayer<'a> {
    pub fn new(
        source: &'a dyn EventSource,
        registry: &'a ProjectorRegistry,
        config: ReplayConfig,
    ) -> Self {
        Self {
            source,
            registry,
            config,
        }
    }

    /// Replay every matching event through the registry's projectors.
    ///
    /// Group sizing: the estimated event count (query planner statistics)
    /// fixes a target group count of `max(10 * workers, estimate /
    /// target_group_size)`; exact per-partition counts then split the key
    /// space into that many groups.
    pub fn replay_all(
        &self,
        make_persistor: &PersistorFactory<'_>,
        bounds: ReplayBounds,
    ) -> Result<ReplayStats> {
        let start = Instant::now();
        let event_types = self.registry.event_types();
        if event_types.is_empty() {
            return Ok(ReplayStats::empty());
        }

        let partitions = self.source.partition_counts(&event_types)?;
        let total: u64 = partitions.values().sum();
        if total == 0 {
            return Ok(ReplayStats::empty());
        }

        let estimated = self.source.estimate_event_count()?.max(1);
        let workers = self.config.worker_count.max(1);
        let target_group_count = (10 * workers as u64)
            .max(estimated / self.config.target_group_size.max(1))
            .max(1);
        let group_size = total.div_ceil(target_group_count).max(1);
        let groups = group_partitions(&partitions, group_size);

        tracing::info!(
            events = total,
            estimated,
            groups = groups.len(),
            workers,
            "starting parallel replay"
        );

        let next_group = AtomicUsize::new(0);
        let poisoned = AtomicBool::new(false);
        let events_replayed = AtomicU64::new(0);
        let first_error: Mutex<Option<UmbraError>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for _ in 0..workers.min(groups.len()) {
                scope.spawn(|| {
                    loop {
                        if poisoned.load(Ordering::Relaxed) {
                            break;
                        }
                        let index = next_group.fetch_add(1, Ordering::SeqCst);
                        let Some(group) = groups.get(index) else {
                            break;
                        };
                        let group_start = Instant::now();
                        match self.replay_group(make_persistor, group, bounds, &event_types, &poisoned)
                        {
                            Ok(count) => {
                                events_replayed.fetch_add(count, Ordering::Relaxed);
                                umbra_core::observe::record_group_replayed(
                                    group_start.elapsed(),
                                    count,
                                );
                                tracing::debug!(%group, events = count, "group replayed");
                            }
                            Err(error) => {
                                log_error_chain(&error, group);
                                umbra_core::observe::record_replay_failure();
                                poisoned.store(true, Ordering::SeqCst);
                                let mut slot = first_error.lock().unwrap();
                                if slot.is_none() {
                                    *slot = Some(error);
                                }
                                break;
                            }
                        }
                    }
                });
            }
        });

        if let Some(error) = first_error.into_inner().unwrap() {
            return Err(error);
        }

        let stats = ReplayStats {
            groups: groups.len(),
            events_replayed: events_replayed.into_inner(),
            duration: start.elapsed(),
        };
        tracing::info!(
            events = stats.events_replayed,
            groups = stats.groups,
            duration_ms = stats.duration.as_millis() as u64,
            "parallel replay finished"
        );
        Ok(stats)
    }

    fn replay_group(
        &self,
        make_persistor: &PersistorFactory<'_>,
        group: &Group,
        bounds: ReplayBounds,
        event_types: &[String],
        poisoned: &AtomicBool,
    ) -> Result<u64> {
        let mut persistor = make_persistor()?;
        let mut filter =
            EventFilter::for_types(event_types.to_vec()).within(group.clone());
        filter.xact_id_below = bounds.xact_id_below;
        filter.xact_id_at_or_above = bounds.xact_id_at_or_above;

        let count = self.source.stream(&filter, &mut |event| {
            if poisoned.load(Ordering::Relaxed) {
                return Err(UmbraError::Replay(
                    "replay aborted after sibling worker failure".into(),
                ));
            }
            for projector in self.registry.handlers_for(&event.event_type) {
                projector.apply(&event, &mut persistor)?;
            }
            Ok(())
        })?;

        // One all-or-nothing flush per group
        persistor.commit()?;
        Ok(count)
    }
}

fn log_error_chain(error: &UmbraError, group: &Group) {
    tracing::error!(%group, "replay worker failed: {error}");
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        tracing::error!("  caused by: {cause}");
        source = cause.source();
    }
}
