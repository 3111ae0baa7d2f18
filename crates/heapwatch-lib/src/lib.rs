//! Heap telemetry analysis engine
//!
//! This crate provides the core functionality for:
//! - Bounded sample history
//! - Trend, GC and baseline analysis with a weighted leak score
//! - Threshold severity and automatic GC requests
//! - Snapshots with comparison and scheduled capture
//! - Health tracking, metrics and structured logging

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod remediation;
pub mod snapshot;

pub use analysis::{LeakAnalysis, LeakAnalyzer, Sensitivity};
pub use config::EngineConfig;
pub use engine::{CaptureReport, EngineEvent, MemoryEngine, TickReport};
pub use error::{EngineError, SnapshotError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::HistoryBuffer;
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use remediation::{AutoGcConfig, AutoGcController, GcRequest, GcState, GcTrigger};
pub use snapshot::{Snapshot, SnapshotComparison, SnapshotInterval, SnapshotSchedule};
