//! Post-collection baseline tracking
//!
//! The value right after each GC event is a "floor" observation. If the floor
//! itself rises, collections are not reclaiming what was allocated, which is
//! stronger leak evidence than a rising raw series.

use super::gc_events::GcEvent;
use super::trend::{classify_slope, linear_regression};
use crate::models::{Sample, Trend};
use serde::{Deserialize, Serialize};

/// Minimum floor observations before a baseline trend is reported
pub const MIN_BASELINE_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselinePoint {
    pub index: usize,
    pub value: u64,
}

/// Floor series and its trend
///
/// `slope` and `trend` are `None` when there were fewer than
/// [`MIN_BASELINE_POINTS`] floors; treat that as "no growth evidence".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub points: Vec<BaselinePoint>,
    pub slope: Option<f64>,
    pub trend: Option<Trend>,
}

impl Baseline {
    pub fn is_sufficient(&self) -> bool {
        self.slope.is_some()
    }

    pub fn is_rising(&self) -> bool {
        self.trend == Some(Trend::Increasing)
    }
}

/// Build the floor series from the detected events
pub fn track_baseline(samples: &[Sample], events: &[GcEvent]) -> Baseline {
    let points: Vec<BaselinePoint> = events
        .iter()
        .filter_map(|event| {
            samples.get(event.index).map(|s| BaselinePoint {
                index: event.index,
                value: s.used,
            })
        })
        .collect();

    if points.len() < MIN_BASELINE_POINTS {
        return Baseline {
            points,
            slope: None,
            trend: None,
        };
    }

    let xy: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p.index as f64, p.value as f64))
        .collect();

    match linear_regression(&xy) {
        Some(fit) => Baseline {
            points,
            slope: Some(fit.slope),
            trend: Some(classify_slope(fit.slope, fit.mean_y)),
        },
        None => Baseline {
            points,
            slope: None,
            trend: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::gc_events::detect_gc_events;
    use crate::analysis::sensitivity::GC_DROP_RATIO;

    fn series(values: &[u64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &used)| Sample::new(i as u64 * 1000, used, 0, 0))
            .collect()
    }

    #[test]
    fn test_rising_floor() {
        let samples = series(&[100, 150, 200, 120, 170, 220, 140, 190, 240, 160]);
        let events = detect_gc_events(&samples, GC_DROP_RATIO);
        assert_eq!(events.len(), 3);

        let baseline = track_baseline(&samples, &events);
        assert_eq!(
            baseline.points.iter().map(|p| p.value).collect::<Vec<_>>(),
            vec![120, 140, 160]
        );
        assert!(baseline.is_sufficient());
        assert!(baseline.is_rising());
        assert!((baseline.slope.unwrap() - 20.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_floor_is_not_rising() {
        let samples = series(&[1000, 2000, 1000, 2000, 1000]);
        let events = detect_gc_events(&samples, GC_DROP_RATIO);
        let baseline = track_baseline(&samples, &events);

        assert!(baseline.is_sufficient());
        assert_eq!(baseline.trend, Some(Trend::Stable));
        assert!(!baseline.is_rising());
    }

    #[test]
    fn test_single_event_is_insufficient() {
        let samples = series(&[100, 200, 50, 60]);
        let events = detect_gc_events(&samples, GC_DROP_RATIO);
        let baseline = track_baseline(&samples, &events);

        assert_eq!(baseline.points.len(), 1);
        assert!(!baseline.is_sufficient());
        assert!(!baseline.is_rising());
        assert!(baseline.trend.is_none());
    }
}
