//! Trend analysis
//!
//! Ordinary least squares over `(index, used)` pairs. The independent
//! variable is the sample position, not wall-clock time, so slopes are in
//! bytes per sample and evenly spaced ticks are assumed.

use crate::models::{Sample, Trend};
use serde::{Deserialize, Serialize};

/// Relative dead band around zero slope, as a fraction of the mean value
const STABLE_BAND_RATIO: f64 = 0.001;

/// Result of a least-squares line fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, 0 when the series has no variance
    pub r_squared: f64,
    pub mean_y: f64,
}

/// Fit `y = slope * x + intercept`
///
/// Returns `None` with fewer than two points or when every `x` is equal.
pub fn linear_regression(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    // Centered sums keep precision with large byte counts
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }

    if sxx.abs() < f64::EPSILON {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in points {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    let r_squared = if ss_tot.abs() < f64::EPSILON {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
        mean_y,
    })
}

/// Classify a slope against a dead band scaled to the data
pub fn classify_slope(slope: f64, mean_value: f64) -> Trend {
    let epsilon = (mean_value.abs() * STABLE_BAND_RATIO).max(1.0);
    if slope > epsilon {
        Trend::Increasing
    } else if slope < -epsilon {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Trend of the raw usage series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub trend: Trend,
    /// `None` with fewer than two samples
    pub fit: Option<LinearFit>,
    /// Slope converted by the mean tick spacing, for display only
    pub bytes_per_second: Option<f64>,
}

impl TrendAnalysis {
    pub fn slope(&self) -> f64 {
        self.fit.map(|f| f.slope).unwrap_or(0.0)
    }

    pub fn r_squared(&self) -> f64 {
        self.fit.map(|f| f.r_squared).unwrap_or(0.0)
    }
}

/// Analyze the trend of `used` over a sample history
pub fn analyze_trend(samples: &[Sample]) -> TrendAnalysis {
    let points: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.used as f64))
        .collect();

    let Some(fit) = linear_regression(&points) else {
        return TrendAnalysis {
            trend: Trend::Stable,
            fit: None,
            bytes_per_second: None,
        };
    };

    TrendAnalysis {
        trend: classify_slope(fit.slope, fit.mean_y),
        fit: Some(fit),
        bytes_per_second: bytes_per_second(samples, fit.slope),
    }
}

fn bytes_per_second(samples: &[Sample], slope: f64) -> Option<f64> {
    let (first, last) = (samples.first()?, samples.last()?);
    let span_ms = last.timestamp.checked_sub(first.timestamp)?;
    if span_ms == 0 || samples.len() < 2 {
        return None;
    }
    let interval_secs = span_ms as f64 / 1000.0 / (samples.len() - 1) as f64;
    Some(slope / interval_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[u64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &used)| Sample::new(i as u64 * 1000, used, used * 2, used * 4))
            .collect()
    }

    #[test]
    fn test_perfectly_linear_series() {
        let values: Vec<u64> = (0..10).map(|i| 1000 * i + 5000).collect();
        let analysis = analyze_trend(&series(&values));

        let fit = analysis.fit.unwrap();
        assert!((fit.slope - 1000.0).abs() < 1e-6);
        assert!((fit.intercept - 5000.0).abs() < 1e-6);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(analysis.trend, Trend::Increasing);
        // One sample per second
        assert!((analysis.bytes_per_second.unwrap() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_series_has_zero_r_squared() {
        let analysis = analyze_trend(&series(&[42_000; 12]));

        let fit = analysis.fit.unwrap();
        assert!(fit.slope.abs() < 1e-9);
        assert_eq!(fit.r_squared, 0.0);
        assert!(!fit.r_squared.is_nan());
        assert_eq!(analysis.trend, Trend::Stable);
    }

    #[test]
    fn test_decreasing_series() {
        let values: Vec<u64> = (0..10).map(|i| 1_000_000 - 20_000 * i).collect();
        let analysis = analyze_trend(&series(&values));
        assert_eq!(analysis.trend, Trend::Decreasing);
        assert!(analysis.slope() < 0.0);
    }

    #[test]
    fn test_small_noise_is_stable() {
        let analysis = analyze_trend(&series(&[1_000_000, 1_000_100, 999_900, 1_000_050]));
        assert_eq!(analysis.trend, Trend::Stable);
    }

    #[test]
    fn test_too_few_samples() {
        assert!(analyze_trend(&[]).fit.is_none());

        let single = analyze_trend(&series(&[5]));
        assert!(single.fit.is_none());
        assert_eq!(single.trend, Trend::Stable);
        assert_eq!(single.slope(), 0.0);
        assert_eq!(single.r_squared(), 0.0);
    }

    #[test]
    fn test_identical_timestamps_no_rate() {
        let samples = vec![Sample::new(5, 10, 10, 10), Sample::new(5, 20, 20, 20)];
        let analysis = analyze_trend(&samples);
        assert!(analysis.fit.is_some());
        assert!(analysis.bytes_per_second.is_none());
    }
}
