//! Replay mechanics for Umbra: partition grouping, buffered bulk
//! persistence and the parallel replay worker pool.
//!
//! The pieces compose bottom-up: [`grouper::group_partitions`] splits the
//! event key space into balanced, deterministic groups;
//! [`persistor::OptimizedPersistor`] buffers one group's writes and flushes
//! them in bulk; [`replayer::ParallelReplayer`] drives a worker pool over
//! the groups.

pub mod grouper;
pub mod persistor;
pub mod replayer;

pub use grouper::group_partitions;
pub use persistor::OptimizedPersistor;
pub use replayer::{ParallelReplayer, PersistorFactory, ReplayBounds, ReplayStats};
