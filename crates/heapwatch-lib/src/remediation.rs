//! Automatic garbage-collection requests
//!
//! Issues a remediation request when usage crosses a configured threshold,
//! at most once per cooldown window. The cooldown is a plain timestamp
//! comparison on the sample clock, so there is no timer to clean up.

use serde::{Deserialize, Serialize};

/// Default cooldown between automatic requests (10 seconds)
pub const DEFAULT_GC_COOLDOWN_MS: u64 = 10_000;

/// Auto-GC settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoGcConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Usage percentage (0-100) at or above which a request is issued
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_GC_COOLDOWN_MS
}

impl Default for AutoGcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: None,
            cooldown_ms: DEFAULT_GC_COOLDOWN_MS,
        }
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcState {
    /// The next qualifying tick may trigger
    Idle,
    /// Inside the window after the last trigger
    Cooldown,
}

/// What caused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcTrigger {
    /// Usage crossed the configured threshold
    Automatic,
    /// Requested by an operator, ignoring the cooldown
    Forced,
}

/// A remediation request for the host to act on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GcRequest {
    pub trigger: GcTrigger,
    /// Sample clock time of the request, in ms
    pub timestamp: u64,
    /// Usage at the time of the request
    pub usage_percentage: f64,
}

/// Two-state (idle/cooldown) rate limiter for GC requests
#[derive(Debug, Clone)]
pub struct AutoGcController {
    config: AutoGcConfig,
    last_trigger: Option<u64>,
}

impl AutoGcController {
    /// Start idle with no previous trigger
    pub fn new(config: AutoGcConfig) -> Self {
        Self {
            config,
            last_trigger: None,
        }
    }

    pub fn config(&self) -> &AutoGcConfig {
        &self.config
    }

    /// Replace settings, keeping the last trigger time
    pub fn set_config(&mut self, config: AutoGcConfig) {
        self.config = config;
    }

    /// Time of the last automatic or forced request
    pub fn last_trigger(&self) -> Option<u64> {
        self.last_trigger
    }

    /// State as seen at `now`
    pub fn state(&self, now: u64) -> GcState {
        if self.cooldown_elapsed(now) {
            GcState::Idle
        } else {
            GcState::Cooldown
        }
    }

    /// Evaluate one tick
    ///
    /// Returns a request when enabled, a threshold is set, usage is at or
    /// above it, and the cooldown window has passed.
    pub fn on_tick(&mut self, now: u64, usage_percentage: f64) -> Option<GcRequest> {
        if !self.config.enabled {
            return None;
        }
        let threshold = self.config.threshold?;
        if !usage_percentage.is_finite() || usage_percentage < threshold {
            return None;
        }
        if !self.cooldown_elapsed(now) {
            return None;
        }

        self.last_trigger = Some(now);
        Some(GcRequest {
            trigger: GcTrigger::Automatic,
            timestamp: now,
            usage_percentage,
        })
    }

    /// Issue a request regardless of cooldown; restarts the window
    pub fn force(&mut self, now: u64, usage_percentage: f64) -> GcRequest {
        self.last_trigger = Some(now);
        GcRequest {
            trigger: GcTrigger::Forced,
            timestamp: now,
            usage_percentage,
        }
    }

    fn cooldown_elapsed(&self, now: u64) -> bool {
        match self.last_trigger {
            None => true,
            // A clock that went backwards counts as elapsed
            Some(last) if now < last => true,
            Some(last) => now - last >= self.config.cooldown_ms,
        }
    }
}

impl Default for AutoGcController {
    fn default() -> Self {
        Self::new(AutoGcConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(threshold: f64, cooldown_ms: u64) -> AutoGcController {
        AutoGcController::new(AutoGcConfig {
            enabled: true,
            threshold: Some(threshold),
            cooldown_ms,
        })
    }

    #[test]
    fn test_cooldown_suppresses_repeat_triggers() {
        let mut controller = enabled(80.0, 10_000);

        let first = controller.on_tick(1_000, 85.0);
        assert!(first.is_some());
        assert_eq!(first.unwrap().trigger, GcTrigger::Automatic);
        assert_eq!(controller.state(1_000), GcState::Cooldown);

        assert!(controller.on_tick(4_000, 85.0).is_none());

        let third = controller.on_tick(12_000, 85.0);
        assert!(third.is_some());
        assert_eq!(controller.last_trigger(), Some(12_000));
    }

    #[test]
    fn test_below_threshold_never_triggers() {
        let mut controller = enabled(80.0, 0);
        assert!(controller.on_tick(0, 79.9).is_none());
        assert!(controller.on_tick(1, f64::NAN).is_none());
        assert_eq!(controller.state(2), GcState::Idle);
    }

    #[test]
    fn test_disabled_or_missing_threshold() {
        let mut disabled = AutoGcController::new(AutoGcConfig {
            enabled: false,
            threshold: Some(10.0),
            cooldown_ms: 0,
        });
        assert!(disabled.on_tick(0, 99.0).is_none());

        let mut no_threshold = AutoGcController::new(AutoGcConfig {
            enabled: true,
            threshold: None,
            cooldown_ms: 0,
        });
        assert!(no_threshold.on_tick(0, 99.0).is_none());
    }

    #[test]
    fn test_force_bypasses_and_resets_cooldown() {
        let mut controller = enabled(80.0, 10_000);
        assert!(controller.on_tick(0, 90.0).is_some());

        let forced = controller.force(2_000, 40.0);
        assert_eq!(forced.trigger, GcTrigger::Forced);

        // Window now measured from the forced request
        assert!(controller.on_tick(11_000, 90.0).is_none());
        assert!(controller.on_tick(12_000, 90.0).is_some());
    }

    #[test]
    fn test_zero_cooldown_triggers_every_tick() {
        let mut controller = enabled(50.0, 0);
        assert!(controller.on_tick(10, 60.0).is_some());
        assert!(controller.on_tick(10, 60.0).is_some());
        assert!(controller.on_tick(11, 60.0).is_some());
    }

    #[test]
    fn test_clock_reset_counts_as_elapsed() {
        let mut controller = enabled(50.0, 10_000);
        assert!(controller.on_tick(50_000, 60.0).is_some());
        assert!(controller.on_tick(1_000, 60.0).is_some());
    }
}
