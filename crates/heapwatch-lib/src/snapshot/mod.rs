//! Memory snapshots
//!
//! This module provides:
//! - A capacity-bounded snapshot store with FIFO eviction
//! - Field-by-field comparison of two snapshots
//! - A cancellable schedule that requests automatic captures

mod compare;
mod schedule;
mod store;

pub use compare::{compare_snapshots, Direction, FieldDelta, SnapshotComparison};
pub use schedule::{ScheduledCapture, SnapshotInterval, SnapshotSchedule};
pub use store::{
    AnalysisContext, Snapshot, SnapshotStore, DEFAULT_MAX_SNAPSHOTS, MAX_SNAPSHOTS, MIN_SNAPSHOTS,
};
