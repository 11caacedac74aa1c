//! Run output: statistics and per-epoch snapshots.

pub mod snapshot;
pub mod stats;

pub use snapshot::{capture_snapshot, SnapshotRecorder};
pub use stats::{gini, StatsCollector};
