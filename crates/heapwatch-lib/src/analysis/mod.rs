//! Memory usage analysis
//!
//! This module provides:
//! - GC event detection (sharp drops between consecutive samples)
//! - Post-GC baseline tracking
//! - Linear trend analysis over the raw series
//! - Weighted leak scoring against a sensitivity profile
//! - Severity classification against usage thresholds

mod baseline;
mod gc_events;
mod leak_scorer;
mod sensitivity;
mod severity;
mod trend;

pub use baseline::{track_baseline, Baseline, BaselinePoint, MIN_BASELINE_POINTS};
pub use gc_events::{detect_gc_events, GcEvent};
pub use leak_scorer::{
    AnalysisStatus, FactorBreakdown, LeakScore, LeakScorer, ScoringInputs,
    MIN_SAMPLES_FOR_DETECTION,
};
pub use sensitivity::{Sensitivity, SensitivityProfile, GC_DROP_RATIO, LEAK_PROBABILITY_THRESHOLD};
pub use severity::{classify_sample, classify_usage, SeverityThresholds};
pub use trend::{analyze_trend, classify_slope, linear_regression, LinearFit, TrendAnalysis};

use crate::models::{Sample, Trend};
use serde::{Deserialize, Serialize};

/// Result of one full analysis pass over the history
///
/// Produced fresh each tick and replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakAnalysis {
    pub probability: f64,
    pub is_leaking: bool,
    pub trend: Trend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub status: AnalysisStatus,
    pub factors: FactorBreakdown,
    pub slope: f64,
    pub r_squared: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<f64>,
    pub gc_event_count: usize,
    pub baseline: Baseline,
    pub sample_count: usize,
    pub observation_secs: f64,
}

impl LeakAnalysis {
    /// Neutral analysis before any samples arrive
    pub fn empty() -> Self {
        LeakAnalyzer::new(Sensitivity::default(), true).analyze(&[])
    }
}

/// Runs the detector, tracker, trend analyzer and scorer over a history
#[derive(Debug, Clone, Copy)]
pub struct LeakAnalyzer {
    sensitivity: Sensitivity,
    scorer: LeakScorer,
    enabled: bool,
}

impl LeakAnalyzer {
    pub fn new(sensitivity: Sensitivity, enabled: bool) -> Self {
        Self {
            sensitivity,
            scorer: LeakScorer::new(sensitivity.profile()),
            enabled,
        }
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    /// Analyze an ordered (oldest first) sample history
    pub fn analyze(&self, samples: &[Sample]) -> LeakAnalysis {
        let profile = self.scorer.profile();
        let trend = analyze_trend(samples);
        let events = detect_gc_events(samples, profile.gc_drop_ratio);
        let baseline = track_baseline(samples, &events);
        let observation_secs = observation_secs(samples);

        let score = if self.enabled {
            self.scorer.score(&ScoringInputs {
                sample_count: samples.len(),
                slope: trend.slope(),
                r_squared: trend.r_squared(),
                gc_event_count: events.len(),
                baseline: &baseline,
                observation_secs,
            })
        } else {
            LeakScore {
                probability: 0.0,
                is_leaking: false,
                factors: FactorBreakdown::default(),
                status: AnalysisStatus::Disabled,
                recommendation: None,
            }
        };

        LeakAnalysis {
            probability: score.probability,
            is_leaking: score.is_leaking,
            trend: trend.trend,
            recommendation: score.recommendation,
            status: score.status,
            factors: score.factors,
            slope: trend.slope(),
            r_squared: trend.r_squared(),
            bytes_per_second: trend.bytes_per_second,
            gc_event_count: events.len(),
            baseline,
            sample_count: samples.len(),
            observation_secs,
        }
    }
}

fn observation_secs(samples: &[Sample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp) as f64 / 1000.0,
        _ => 0.0,
    }
}
