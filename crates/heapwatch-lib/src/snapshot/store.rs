//! Capacity-bounded snapshot log

use crate::error::SnapshotError;
use crate::models::{Sample, Severity, Trend};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Default number of retained snapshots
pub const DEFAULT_MAX_SNAPSHOTS: usize = 10;

/// Hard bounds for the configured maximum
pub const MIN_SNAPSHOTS: usize = 1;
pub const MAX_SNAPSHOTS: usize = 50;

/// Classification frozen at capture time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub trend: Trend,
    pub leak_probability: f64,
    pub severity: Severity,
    pub usage_percentage: f64,
}

/// Immutable point-in-time memory capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub label: String,
    /// Sample clock (ms) of the captured sample
    pub timestamp: u64,
    pub captured_at: DateTime<Utc>,
    pub heap_used: u64,
    pub heap_total: u64,
    pub heap_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_nodes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_listeners: Option<u64>,
    pub is_auto: bool,
    pub analysis_context: AnalysisContext,
}

/// Insertion-ordered snapshot store with FIFO eviction
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    snapshots: VecDeque<Snapshot>,
    max_snapshots: usize,
    auto_evict: bool,
    next_id: u64,
}

impl SnapshotStore {
    /// `max_snapshots` is clamped to 1-50
    pub fn new(max_snapshots: usize, auto_evict: bool) -> Self {
        Self {
            snapshots: VecDeque::new(),
            max_snapshots: clamp_max(max_snapshots),
            auto_evict,
            next_id: 1,
        }
    }

    /// Record a snapshot of `sample`
    ///
    /// At capacity, the oldest entry is evicted when auto-eviction is on;
    /// otherwise the capture is rejected and the store is left untouched.
    pub fn capture(
        &mut self,
        label: &str,
        is_auto: bool,
        sample: &Sample,
        context: AnalysisContext,
    ) -> Result<Snapshot, SnapshotError> {
        if self.snapshots.len() >= self.max_snapshots {
            if !self.auto_evict {
                return Err(SnapshotError::CapacityExceeded {
                    max: self.max_snapshots,
                });
            }
            while self.snapshots.len() >= self.max_snapshots {
                if let Some(evicted) = self.evict_oldest() {
                    debug!(snapshot_id = evicted.id, "Evicted oldest snapshot");
                }
            }
        }

        let id = self.next_id;
        self.next_id += 1;

        let label = if label.trim().is_empty() {
            if is_auto {
                format!("Auto {}", id)
            } else {
                format!("Snapshot {}", id)
            }
        } else {
            label.trim().to_string()
        };

        let snapshot = Snapshot {
            id,
            label,
            timestamp: sample.timestamp,
            captured_at: Utc::now(),
            heap_used: sample.used,
            heap_total: sample.total,
            heap_limit: sample.limit,
            dom_nodes: sample.dom_nodes,
            event_listeners: sample.listeners,
            is_auto,
            analysis_context: context,
        };

        self.snapshots.push_back(snapshot.clone());
        Ok(snapshot)
    }

    /// Remove a snapshot by id
    pub fn delete(&mut self, id: u64) -> bool {
        match self.snapshots.iter().position(|s| s.id == id) {
            Some(pos) => {
                self.snapshots.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Snapshots, oldest first
    pub fn list(&self) -> Vec<Snapshot> {
        self.snapshots.iter().cloned().collect()
    }

    /// Look up a snapshot by id
    pub fn get(&self, id: u64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Current capacity
    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    pub fn auto_evict(&self) -> bool {
        self.auto_evict
    }

    pub fn set_auto_evict(&mut self, auto_evict: bool) {
        self.auto_evict = auto_evict;
    }

    /// Change the maximum; the oldest entries are dropped if over the new cap
    pub fn set_max_snapshots(&mut self, max_snapshots: usize) {
        self.max_snapshots = clamp_max(max_snapshots);
        while self.snapshots.len() > self.max_snapshots {
            self.evict_oldest();
        }
    }

    /// Remove every snapshot; ids keep increasing
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Oldest by sample timestamp; ties go to the earlier insertion
    fn evict_oldest(&mut self) -> Option<Snapshot> {
        let pos = self
            .snapshots
            .iter()
            .enumerate()
            .min_by_key(|(pos, s)| (s.timestamp, *pos))
            .map(|(pos, _)| pos)?;
        self.snapshots.remove(pos)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS, true)
    }
}

fn clamp_max(max_snapshots: usize) -> usize {
    max_snapshots.clamp(MIN_SNAPSHOTS, MAX_SNAPSHOTS)
}
