//! Usage severity classification

use crate::models::{Sample, Severity};
use serde::{Deserialize, Serialize};

/// Percent-of-limit thresholds (0-100)
///
/// `warning < critical` is expected but not required; the critical check
/// always runs first so inverted thresholds still give a deterministic answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            warning: 70.0,
            critical: 90.0,
        }
    }
}

/// Classify `used / limit`; an unknown (zero) limit is always normal
pub fn classify_usage(used: u64, limit: u64, thresholds: &SeverityThresholds) -> Severity {
    if limit == 0 {
        return Severity::Normal;
    }

    let percent = used as f64 / limit as f64 * 100.0;
    if percent >= thresholds.critical {
        Severity::Critical
    } else if percent >= thresholds.warning {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Classify a sample's usage against its own limit
pub fn classify_sample(sample: &Sample, thresholds: &SeverityThresholds) -> Severity {
    classify_usage(sample.used, sample.limit, thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let t = SeverityThresholds::default();
        assert_eq!(classify_usage(85, 100, &t), Severity::Warning);
        assert_eq!(classify_usage(95, 100, &t), Severity::Critical);
        assert_eq!(classify_usage(50, 100, &t), Severity::Normal);
        assert_eq!(classify_usage(90, 100, &t), Severity::Critical);
        assert_eq!(classify_usage(70, 100, &t), Severity::Warning);
    }

    #[test]
    fn test_zero_limit_is_normal() {
        let t = SeverityThresholds::default();
        assert_eq!(classify_usage(95, 0, &t), Severity::Normal);
        assert_eq!(classify_usage(0, 0, &t), Severity::Normal);
    }

    #[test]
    fn test_inverted_thresholds_prefer_critical() {
        let t = SeverityThresholds {
            warning: 90.0,
            critical: 60.0,
        };
        assert_eq!(classify_usage(75, 100, &t), Severity::Critical);
        assert_eq!(classify_usage(50, 100, &t), Severity::Normal);
    }

    #[test]
    fn test_usage_above_limit() {
        let t = SeverityThresholds::default();
        let sample = Sample::new(0, 150, 120, 100);
        assert_eq!(classify_sample(&sample, &t), Severity::Critical);
    }
}
