//! Error types for the engine

use thiserror::Error;

/// Snapshot store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Store is full and auto-eviction is disabled
    #[error("snapshot store is full ({max} snapshots) and auto-eviction is disabled")]
    CapacityExceeded { max: usize },

    #[error("snapshot {0} not found")]
    NotFound(u64),
}

/// Engine-level failures surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// An operation needs at least one recorded sample
    #[error("no samples recorded yet")]
    NoSamples,
}

impl EngineError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Snapshot(SnapshotError::CapacityExceeded { .. }) => "capacity_exceeded",
            EngineError::Snapshot(SnapshotError::NotFound(_)) => "not_found",
            EngineError::NoSamples => "no_samples",
        }
    }
}
