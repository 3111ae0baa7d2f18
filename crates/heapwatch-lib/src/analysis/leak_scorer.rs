//! Memory leak scoring
//!
//! Combines five independently capped factors into a 0-100 probability:
//!
//! | Factor             | Cap |
//! |--------------------|-----|
//! | slope magnitude    | 30  |
//! | R²                 | 20  |
//! | GC ineffectiveness | 25  |
//! | observation time   | 15  |
//! | baseline growth    | 10  |
//!
//! Short observations are gated to 0 so bursts never look like leaks.

use super::baseline::Baseline;
use super::sensitivity::SensitivityProfile;
use serde::{Deserialize, Serialize};

/// Minimum samples required for leak detection
pub const MIN_SAMPLES_FOR_DETECTION: usize = 10;

const SLOPE_CAP: f64 = 30.0;
const R_SQUARED_CAP: f64 = 20.0;
const GC_CAP: f64 = 25.0;
const OBSERVATION_CAP: f64 = 15.0;
const BASELINE_CAP: f64 = 10.0;

/// Slope and observation factors saturate at this multiple of the minimum
const SATURATION_MULTIPLE: f64 = 2.0;

/// Everything the scorer needs from one analysis pass
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    pub sample_count: usize,
    pub slope: f64,
    pub r_squared: f64,
    pub gc_event_count: usize,
    pub baseline: &'a Baseline,
    pub observation_secs: f64,
}

/// Individual factor contributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub slope: f64,
    pub r_squared: f64,
    pub gc_ineffectiveness: f64,
    pub observation: f64,
    pub baseline_growth: f64,
}

impl FactorBreakdown {
    pub fn total(&self) -> f64 {
        self.slope + self.r_squared + self.gc_ineffectiveness + self.observation + self.baseline_growth
    }

    /// Factor with the largest share of its own cap
    fn dominant(&self) -> Option<Factor> {
        let shares = [
            (Factor::Slope, self.slope / SLOPE_CAP),
            (Factor::RSquared, self.r_squared / R_SQUARED_CAP),
            (Factor::GcIneffective, self.gc_ineffectiveness / GC_CAP),
            (Factor::Observation, self.observation / OBSERVATION_CAP),
            (Factor::BaselineGrowth, self.baseline_growth / BASELINE_CAP),
        ];

        // Later entries win ties, so baseline/GC evidence is preferred
        shares
            .into_iter()
            .filter(|(_, share)| *share > 0.0)
            .fold(None, |best: Option<(Factor, f64)>, (factor, share)| match best {
                Some((_, best_share)) if best_share > share => best,
                _ => Some((factor, share)),
            })
            .map(|(factor, _)| factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Factor {
    Slope,
    RSquared,
    GcIneffective,
    Observation,
    BaselineGrowth,
}

impl Factor {
    fn recommendation(self) -> &'static str {
        match self {
            Factor::Slope => "Usage is climbing quickly; look for caches or collections that grow without bound",
            Factor::RSquared => "Growth is steady and linear; check per-tick allocations that are never released",
            Factor::GcIneffective => "GC appears ineffective; references are surviving collection",
            Factor::Observation => "Growth has persisted across a long window; compare snapshots to find retained objects",
            Factor::BaselineGrowth => "Post-GC baseline is rising; investigate listener/DOM growth",
        }
    }
}

/// Why a score is (or is not) meaningful
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Leak detection is switched off
    Disabled,
    InsufficientSamples { have: usize, need: usize },
    InsufficientObservation { observed_secs: f64, required_secs: f64 },
    /// Enough data; the probability reflects the evidence
    Complete,
}

impl AnalysisStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, AnalysisStatus::Complete)
    }
}

/// Scorer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakScore {
    pub probability: f64,
    pub is_leaking: bool,
    pub factors: FactorBreakdown,
    pub status: AnalysisStatus,
    pub recommendation: Option<String>,
}

impl LeakScore {
    fn neutral(status: AnalysisStatus) -> Self {
        Self {
            probability: 0.0,
            is_leaking: false,
            factors: FactorBreakdown::default(),
            status,
            recommendation: None,
        }
    }
}

/// Weighted leak scorer for one sensitivity profile
#[derive(Debug, Clone, Copy)]
pub struct LeakScorer {
    profile: SensitivityProfile,
}

impl LeakScorer {
    pub fn new(profile: SensitivityProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SensitivityProfile {
        &self.profile
    }

    /// Score one pass; gates force probability 0
    pub fn score(&self, inputs: &ScoringInputs<'_>) -> LeakScore {
        if inputs.sample_count < MIN_SAMPLES_FOR_DETECTION {
            return LeakScore::neutral(AnalysisStatus::InsufficientSamples {
                have: inputs.sample_count,
                need: MIN_SAMPLES_FOR_DETECTION,
            });
        }

        if inputs.observation_secs < self.profile.min_observation_secs {
            return LeakScore::neutral(AnalysisStatus::InsufficientObservation {
                observed_secs: inputs.observation_secs,
                required_secs: self.profile.min_observation_secs,
            });
        }

        let factors = FactorBreakdown {
            slope: self.slope_factor(inputs.slope),
            r_squared: self.r_squared_factor(inputs.slope, inputs.r_squared),
            gc_ineffectiveness: self.gc_factor(inputs),
            observation: self.observation_factor(inputs.observation_secs),
            baseline_growth: self.baseline_factor(inputs.baseline),
        };

        let probability = factors.total().clamp(0.0, 100.0);
        let recommendation = if probability > 0.0 {
            factors.dominant().map(|f| f.recommendation().to_string())
        } else {
            None
        };

        LeakScore {
            probability,
            is_leaking: probability >= self.profile.leak_threshold,
            factors,
            status: AnalysisStatus::Complete,
            recommendation,
        }
    }

    fn slope_factor(&self, slope: f64) -> f64 {
        if !slope.is_finite() || slope <= 0.0 {
            return 0.0;
        }
        let saturation = self.profile.min_slope_bytes_per_sample * SATURATION_MULTIPLE;
        SLOPE_CAP * capped_ratio(slope, saturation)
    }

    fn r_squared_factor(&self, slope: f64, r_squared: f64) -> f64 {
        // A tight fit to a falling line is not leak evidence
        if slope <= 0.0 || !r_squared.is_finite() {
            return 0.0;
        }
        R_SQUARED_CAP * capped_ratio(r_squared, self.profile.min_r_squared)
    }

    fn gc_factor(&self, inputs: &ScoringInputs<'_>) -> f64 {
        if inputs.gc_event_count == 0 {
            return 0.0;
        }

        let cycles = capped_ratio(
            inputs.gc_event_count as f64,
            self.profile.min_gc_cycles.max(1) as f64,
        );

        match inputs.baseline.slope {
            Some(baseline_slope) if baseline_slope >= 0.0 => GC_CAP * cycles,
            Some(_) => 0.0,
            // One collection only: fall back to the raw series at half weight
            None if inputs.slope > 0.0 => GC_CAP * cycles * 0.5,
            None => 0.0,
        }
    }

    fn observation_factor(&self, observation_secs: f64) -> f64 {
        let saturation = self.profile.min_observation_secs * SATURATION_MULTIPLE;
        OBSERVATION_CAP * capped_ratio(observation_secs, saturation)
    }

    fn baseline_factor(&self, baseline: &Baseline) -> f64 {
        if !baseline.is_rising() {
            return 0.0;
        }
        let slope = baseline.slope.unwrap_or(0.0);
        BASELINE_CAP * capped_ratio(slope, self.profile.min_slope_bytes_per_sample)
    }
}

/// `value / limit` clamped to `[0, 1]`; a non-positive limit saturates
fn capped_ratio(value: f64, limit: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    if limit <= 0.0 {
        return 1.0;
    }
    (value / limit).min(1.0)
}
