//! Engine configuration
//!
//! Every field is optional when deserializing and falls back to its default.
//! The engine never reads or writes storage; hosts persist this value however
//! they like and hand it over at construction or via `reconfigure`.

use crate::analysis::{Sensitivity, SeverityThresholds};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::remediation::AutoGcConfig;
use crate::snapshot::{SnapshotInterval, DEFAULT_MAX_SNAPSHOTS, MAX_SNAPSHOTS, MIN_SNAPSHOTS};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default polling interval (1 second)
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1_000;

/// Shortest polling interval accepted
pub const MIN_POLLING_INTERVAL_MS: u64 = 100;

/// Leak detection settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakDetectionConfig {
    pub enabled: bool,
    pub sensitivity: Sensitivity,
}

impl Default for LeakDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: Sensitivity::Medium,
        }
    }
}

/// Snapshot store settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub max_snapshots: usize,
    pub auto_interval: SnapshotInterval,
    pub auto_evict: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            auto_interval: SnapshotInterval::Off,
            auto_evict: true,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sampling cadence the host should drive ticks at
    pub polling_interval_ms: u64,
    /// Usage percent (0-100) for the warning level
    pub warning_threshold: f64,
    /// Usage percent (0-100) for the critical level
    pub critical_threshold: f64,
    pub auto_gc: AutoGcConfig,
    pub leak_detection: LeakDetectionConfig,
    pub history_capacity: usize,
    pub snapshots: SnapshotConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            warning_threshold: 70.0,
            critical_threshold: 90.0,
            auto_gc: AutoGcConfig::default(),
            leak_detection: LeakDetectionConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            snapshots: SnapshotConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a persisted JSON configuration object
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn thresholds(&self) -> SeverityThresholds {
        SeverityThresholds {
            warning: self.warning_threshold,
            critical: self.critical_threshold,
        }
    }

    /// Clamp out-of-range values to deterministic, usable ones
    ///
    /// Inverted warning/critical thresholds are kept as-is; the classifier
    /// resolves them by checking critical first.
    pub fn normalized(&self) -> Self {
        let defaults = EngineConfig::default();
        let mut config = self.clone();

        config.warning_threshold = clamp_percent(
            "warning_threshold",
            self.warning_threshold,
            defaults.warning_threshold,
        );
        config.critical_threshold = clamp_percent(
            "critical_threshold",
            self.critical_threshold,
            defaults.critical_threshold,
        );

        config.auto_gc.threshold = match self.auto_gc.threshold {
            Some(t) if t.is_finite() => Some(t.clamp(0.0, 100.0)),
            Some(t) => {
                warn!(value = t, "Ignoring non-finite auto-GC threshold");
                None
            }
            None => None,
        };

        if self.polling_interval_ms < MIN_POLLING_INTERVAL_MS {
            warn!(
                value = self.polling_interval_ms,
                min = MIN_POLLING_INTERVAL_MS,
                "Polling interval too short, clamping"
            );
            config.polling_interval_ms = MIN_POLLING_INTERVAL_MS;
        }

        if self.history_capacity == 0 {
            warn!("History capacity of 0 is not usable, using 1");
            config.history_capacity = 1;
        }

        let max = self.snapshots.max_snapshots;
        if !(MIN_SNAPSHOTS..=MAX_SNAPSHOTS).contains(&max) {
            warn!(
                value = max,
                min = MIN_SNAPSHOTS,
                max = MAX_SNAPSHOTS,
                "Snapshot maximum out of range, clamping"
            );
            config.snapshots.max_snapshots = max.clamp(MIN_SNAPSHOTS, MAX_SNAPSHOTS);
        }

        config
    }
}

fn clamp_percent(name: &str, value: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        warn!(setting = name, "Non-finite threshold, using default");
        return fallback;
    }
    if !(0.0..=100.0).contains(&value) {
        warn!(setting = name, value = value, "Threshold out of range, clamping");
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.polling_interval_ms, 1_000);
        assert_eq!(config.warning_threshold, 70.0);
        assert_eq!(config.critical_threshold, 90.0);
        assert!(!config.auto_gc.enabled);
        assert_eq!(config.auto_gc.cooldown_ms, 10_000);
        assert!(config.leak_detection.enabled);
        assert_eq!(config.leak_detection.sensitivity, Sensitivity::Medium);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.snapshots.max_snapshots, 10);
        assert_eq!(config.snapshots.auto_interval, SnapshotInterval::Off);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(
            r#"{
                "critical_threshold": 95,
                "auto_gc": {"enabled": true, "threshold": 80},
                "leak_detection": {"sensitivity": "high"},
                "snapshots": {"auto_interval": "30m"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.critical_threshold, 95.0);
        assert_eq!(config.warning_threshold, 70.0);
        assert_eq!(config.auto_gc.threshold, Some(80.0));
        assert_eq!(config.auto_gc.cooldown_ms, 10_000);
        assert!(config.leak_detection.enabled);
        assert_eq!(config.leak_detection.sensitivity, Sensitivity::High);
        assert_eq!(config.snapshots.auto_interval, SnapshotInterval::ThirtyMinutes);
        assert!(config.snapshots.auto_evict);
    }

    #[test]
    fn test_json_round_trip() {
        let config = EngineConfig::default();
        let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_normalize_degenerate_values() {
        let config = EngineConfig {
            polling_interval_ms: 0,
            warning_threshold: -5.0,
            critical_threshold: f64::NAN,
            history_capacity: 0,
            snapshots: SnapshotConfig {
                max_snapshots: 80,
                ..Default::default()
            },
            auto_gc: AutoGcConfig {
                enabled: true,
                threshold: Some(150.0),
                cooldown_ms: 0,
            },
            ..Default::default()
        }
        .normalized();

        assert_eq!(config.polling_interval_ms, MIN_POLLING_INTERVAL_MS);
        assert_eq!(config.warning_threshold, 0.0);
        assert_eq!(config.critical_threshold, 90.0);
        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.snapshots.max_snapshots, 50);
        assert_eq!(config.auto_gc.threshold, Some(100.0));
        assert_eq!(config.auto_gc.cooldown_ms, 0);
    }

    #[test]
    fn test_inverted_thresholds_are_kept() {
        let config = EngineConfig {
            warning_threshold: 95.0,
            critical_threshold: 60.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.thresholds().warning, 95.0);
        assert_eq!(config.thresholds().critical, 60.0);
    }
}
