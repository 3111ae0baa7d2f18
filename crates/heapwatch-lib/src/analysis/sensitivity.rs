//! Sensitivity profiles for leak scoring

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fraction of used memory that must disappear between two samples to count
/// as a garbage-collection event
pub const GC_DROP_RATIO: f64 = 0.10;

/// Probability at or above which a leak is reported
pub const LEAK_PROBABILITY_THRESHOLD: f64 = 70.0;

/// Named sensitivity level, selected by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Static thresholds for this level
    pub const fn profile(self) -> SensitivityProfile {
        match self {
            Sensitivity::Low => SensitivityProfile {
                min_slope_bytes_per_sample: 100.0 * 1024.0,
                min_r_squared: 0.9,
                min_gc_cycles: 3,
                min_observation_secs: 60.0,
                gc_drop_ratio: GC_DROP_RATIO,
                leak_threshold: LEAK_PROBABILITY_THRESHOLD,
            },
            Sensitivity::Medium => SensitivityProfile {
                min_slope_bytes_per_sample: 50.0 * 1024.0,
                min_r_squared: 0.8,
                min_gc_cycles: 2,
                min_observation_secs: 30.0,
                gc_drop_ratio: GC_DROP_RATIO,
                leak_threshold: LEAK_PROBABILITY_THRESHOLD,
            },
            Sensitivity::High => SensitivityProfile {
                min_slope_bytes_per_sample: 20.0 * 1024.0,
                min_r_squared: 0.6,
                min_gc_cycles: 1,
                min_observation_secs: 15.0,
                gc_drop_ratio: GC_DROP_RATIO,
                leak_threshold: LEAK_PROBABILITY_THRESHOLD,
            },
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Low => write!(f, "low"),
            Sensitivity::Medium => write!(f, "medium"),
            Sensitivity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            other => Err(format!("unknown sensitivity '{}', expected low|medium|high", other)),
        }
    }
}

/// Thresholds the leak scorer measures evidence against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityProfile {
    pub min_slope_bytes_per_sample: f64,
    pub min_r_squared: f64,
    pub min_gc_cycles: usize,
    pub min_observation_secs: f64,
    pub gc_drop_ratio: f64,
    pub leak_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_tighten_with_sensitivity() {
        let low = Sensitivity::Low.profile();
        let medium = Sensitivity::Medium.profile();
        let high = Sensitivity::High.profile();

        assert!(low.min_slope_bytes_per_sample > medium.min_slope_bytes_per_sample);
        assert!(medium.min_slope_bytes_per_sample > high.min_slope_bytes_per_sample);
        assert!(low.min_observation_secs > high.min_observation_secs);
        assert_eq!(medium.leak_threshold, 70.0);
    }

    #[test]
    fn test_parse_sensitivity() {
        assert_eq!("HIGH".parse::<Sensitivity>().unwrap(), Sensitivity::High);
        assert!("extreme".parse::<Sensitivity>().is_err());
        assert_eq!(Sensitivity::default(), Sensitivity::Medium);
    }
}
