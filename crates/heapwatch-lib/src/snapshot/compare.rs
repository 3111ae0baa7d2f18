//! Two-snapshot comparison

use super::store::Snapshot;
use serde::{Deserialize, Serialize};

/// Which way a field moved from the first snapshot to the second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Unchanged,
}

/// Change in one field
///
/// Fields missing or invalid on either side are reported as `NotAvailable`
/// rather than as a zero or NaN delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldDelta {
    Available {
        before: f64,
        after: f64,
        diff: f64,
        /// Relative change in percent, absent when `before` is 0
        #[serde(skip_serializing_if = "Option::is_none")]
        percentage: Option<f64>,
        direction: Direction,
    },
    NotAvailable,
}

impl FieldDelta {
    pub fn between(before: Option<f64>, after: Option<f64>) -> Self {
        let (Some(before), Some(after)) = (before, after) else {
            return FieldDelta::NotAvailable;
        };
        if !before.is_finite() || !after.is_finite() {
            return FieldDelta::NotAvailable;
        }

        let diff = after - before;
        let percentage = if before == 0.0 {
            None
        } else {
            Some(diff / before.abs() * 100.0)
        };
        let direction = if diff > 0.0 {
            Direction::Up
        } else if diff < 0.0 {
            Direction::Down
        } else {
            Direction::Unchanged
        };

        FieldDelta::Available {
            before,
            after,
            diff,
            percentage,
            direction,
        }
    }

    pub fn diff(&self) -> Option<f64> {
        match self {
            FieldDelta::Available { diff, .. } => Some(*diff),
            FieldDelta::NotAvailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, FieldDelta::Available { .. })
    }
}

/// Per-field deltas from snapshot `from` to snapshot `to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotComparison {
    pub from_id: u64,
    pub to_id: u64,
    /// Milliseconds between the two captures on the sample clock
    pub elapsed_ms: i64,
    pub heap_used: FieldDelta,
    pub heap_total: FieldDelta,
    pub heap_limit: FieldDelta,
    pub dom_nodes: FieldDelta,
    pub event_listeners: FieldDelta,
    pub usage_percentage: FieldDelta,
    pub leak_probability: FieldDelta,
}

/// Signed `to - from`, saturated to the `i64` range
fn elapsed_ms(from: u64, to: u64) -> i64 {
    let diff = to as i128 - from as i128;
    diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Compare two snapshots field by field
pub fn compare_snapshots(from: &Snapshot, to: &Snapshot) -> SnapshotComparison {
    let bytes = |v: u64| Some(v as f64);
    let count = |v: Option<u64>| v.map(|n| n as f64);
    // A zero limit means "unknown", not zero bytes
    let limit = |v: u64| if v == 0 { None } else { Some(v as f64) };

    let usage = |s: &Snapshot| {
        if s.heap_limit == 0 {
            None
        } else {
            Some(s.analysis_context.usage_percentage)
        }
    };

    SnapshotComparison {
        from_id: from.id,
        to_id: to.id,
        elapsed_ms: elapsed_ms(from.timestamp, to.timestamp),
        heap_used: FieldDelta::between(bytes(from.heap_used), bytes(to.heap_used)),
        heap_total: FieldDelta::between(bytes(from.heap_total), bytes(to.heap_total)),
        heap_limit: FieldDelta::between(limit(from.heap_limit), limit(to.heap_limit)),
        dom_nodes: FieldDelta::between(count(from.dom_nodes), count(to.dom_nodes)),
        event_listeners: FieldDelta::between(
            count(from.event_listeners),
            count(to.event_listeners),
        ),
        usage_percentage: FieldDelta::between(usage(from), usage(to)),
        leak_probability: FieldDelta::between(
            Some(from.analysis_context.leak_probability),
            Some(to.analysis_context.leak_probability),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;
    use crate::snapshot::store::tests::context;
    use crate::snapshot::store::SnapshotStore;

    #[test]
    fn test_heap_growth_reports_up() {
        let mut store = SnapshotStore::default();
        let a = store
            .capture("a", false, &Sample::new(0, 1_000_000, 2_000_000, 4_000_000), context())
            .unwrap();
        let b = store
            .capture("b", false, &Sample::new(5_000, 1_500_000, 2_000_000, 4_000_000), context())
            .unwrap();

        let cmp = compare_snapshots(&a, &b);
        assert_eq!(cmp.elapsed_ms, 5_000);
        assert_eq!(
            cmp.heap_used,
            FieldDelta::Available {
                before: 1_000_000.0,
                after: 1_500_000.0,
                diff: 500_000.0,
                percentage: Some(50.0),
                direction: Direction::Up,
            }
        );
        assert!(matches!(
            cmp.heap_total,
            FieldDelta::Available {
                direction: Direction::Unchanged,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_fields_are_not_available() {
        let mut store = SnapshotStore::default();
        let a = store
            .capture("a", false, &Sample::new(0, 10, 10, 0).with_dom_nodes(5), context())
            .unwrap();
        let b = store
            .capture("b", false, &Sample::new(1, 5, 10, 0), context())
            .unwrap();

        let cmp = compare_snapshots(&a, &b);
        assert_eq!(cmp.dom_nodes, FieldDelta::NotAvailable);
        assert_eq!(cmp.event_listeners, FieldDelta::NotAvailable);
        assert_eq!(cmp.heap_limit, FieldDelta::NotAvailable);
        assert_eq!(cmp.usage_percentage, FieldDelta::NotAvailable);
        assert_eq!(cmp.heap_used.diff(), Some(-5.0));
    }

    #[test]
    fn test_elapsed_saturates_on_extreme_timestamps() {
        let mut store = SnapshotStore::default();
        let early = store
            .capture("early", false, &Sample::new(0, 1, 1, 1), context())
            .unwrap();
        let late = store
            .capture("late", false, &Sample::new(u64::MAX, 1, 1, 1), context())
            .unwrap();

        assert_eq!(compare_snapshots(&early, &late).elapsed_ms, i64::MAX);
        assert_eq!(compare_snapshots(&late, &early).elapsed_ms, i64::MIN);
        assert_eq!(elapsed_ms(u64::MAX - 10, u64::MAX), 10);
    }

    #[test]
    fn test_zero_before_has_no_percentage() {
        let delta = FieldDelta::between(Some(0.0), Some(10.0));
        assert!(matches!(
            delta,
            FieldDelta::Available {
                percentage: None,
                direction: Direction::Up,
                ..
            }
        ));
        assert_eq!(FieldDelta::between(Some(f64::NAN), Some(1.0)), FieldDelta::NotAvailable);
    }

    #[test]
    fn test_delta_serializes_with_status_tag() {
        let json = serde_json::to_value(FieldDelta::between(Some(2.0), Some(1.0))).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["direction"], "down");
        assert_eq!(json["percentage"], -50.0);
    }
}
