//! Memory telemetry engine
//!
//! The single owner of history, remediation state and snapshots. Hosts call
//! [`MemoryEngine::tick`] once per sample; each call runs every analyzer to
//! completion and returns the resulting classification and events. Nothing
//! here spawns threads or timers.

use crate::analysis::{classify_sample, LeakAnalysis, LeakAnalyzer};
use crate::config::EngineConfig;
use crate::error::{EngineError, SnapshotError};
use crate::history::HistoryBuffer;
use crate::models::{Sample, Severity};
use crate::remediation::{AutoGcController, GcRequest, GcState};
use crate::snapshot::{
    compare_snapshots, AnalysisContext, Snapshot, SnapshotComparison, SnapshotInterval,
    SnapshotStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Something the host may want to react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Fired on every tick
    UsageUpdated {
        timestamp: u64,
        used: u64,
        limit: u64,
        usage_percentage: f64,
        severity: Severity,
    },
    /// Severity entered warning from normal
    WarningCrossed { timestamp: u64, usage_percentage: f64 },
    /// Severity entered critical from a lower level
    CriticalCrossed { timestamp: u64, usage_percentage: f64 },
    /// The leak flag flipped from false to true
    LeakDetected {
        timestamp: u64,
        probability: f64,
        recommendation: Option<String>,
    },
    /// Usage crossed the auto-GC threshold outside the cooldown
    AutoGcTriggered(GcRequest),
    /// A manual or scheduled capture was stored
    SnapshotCaptured {
        snapshot_id: u64,
        label: String,
        is_auto: bool,
    },
}

impl EngineEvent {
    /// Stable snake_case name, matching the serde tag
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::UsageUpdated { .. } => "usage_updated",
            EngineEvent::WarningCrossed { .. } => "warning_crossed",
            EngineEvent::CriticalCrossed { .. } => "critical_crossed",
            EngineEvent::LeakDetected { .. } => "leak_detected",
            EngineEvent::AutoGcTriggered(_) => "auto_gc_triggered",
            EngineEvent::SnapshotCaptured { .. } => "snapshot_captured",
        }
    }
}

impl From<&Snapshot> for EngineEvent {
    fn from(snapshot: &Snapshot) -> Self {
        EngineEvent::SnapshotCaptured {
            snapshot_id: snapshot.id,
            label: snapshot.label.clone(),
            is_auto: snapshot.is_auto,
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub sample: Sample,
    pub usage_percentage: f64,
    pub severity: Severity,
    pub analysis: LeakAnalysis,
    pub gc_request: Option<GcRequest>,
    pub events: Vec<EngineEvent>,
}

/// Outcome of a snapshot capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub snapshot: Snapshot,
    /// Always holds the `snapshot_captured` event
    pub events: Vec<EngineEvent>,
}

/// Memory telemetry analysis engine
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    config: EngineConfig,
    history: HistoryBuffer,
    analyzer: LeakAnalyzer,
    controller: AutoGcController,
    snapshots: SnapshotStore,
    last_severity: Severity,
    was_leaking: bool,
    last_analysis: LeakAnalysis,
    ticks: u64,
}

impl MemoryEngine {
    /// Build an engine from a configuration, normalizing it first
    pub fn new(config: EngineConfig) -> Self {
        let config = config.normalized();
        Self {
            history: HistoryBuffer::new(config.history_capacity),
            analyzer: LeakAnalyzer::new(
                config.leak_detection.sensitivity,
                config.leak_detection.enabled,
            ),
            controller: AutoGcController::new(config.auto_gc),
            snapshots: SnapshotStore::new(
                config.snapshots.max_snapshots,
                config.snapshots.auto_evict,
            ),
            last_severity: Severity::Normal,
            was_leaking: false,
            last_analysis: LeakAnalysis::empty(),
            ticks: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Newest recorded sample
    pub fn latest_sample(&self) -> Option<&Sample> {
        self.history.latest()
    }

    /// Analysis from the most recent tick
    pub fn last_analysis(&self) -> &LeakAnalysis {
        &self.last_analysis
    }

    pub fn last_severity(&self) -> Severity {
        self.last_severity
    }

    /// Ticks processed since construction
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Current time on the sample clock
    ///
    /// The latest sample's timestamp; before the first sample, the last GC
    /// trigger time or 0. Cooldowns are measured on this clock only.
    pub fn clock(&self) -> u64 {
        self.history
            .latest()
            .map(|s| s.timestamp)
            .or_else(|| self.controller.last_trigger())
            .unwrap_or(0)
    }

    /// Controller state at [`MemoryEngine::clock`]
    pub fn gc_state(&self) -> GcState {
        self.controller.state(self.clock())
    }

    /// Timestamp of the last automatic or forced GC request
    pub fn last_gc_trigger(&self) -> Option<u64> {
        self.controller.last_trigger()
    }

    /// Record a sample and run every analyzer over the new history
    pub fn tick(&mut self, sample: Sample) -> TickReport {
        self.history.push(sample);
        self.ticks += 1;

        let analysis = self.analyzer.analyze(self.history.all());
        let severity = classify_sample(&sample, &self.config.thresholds());
        let usage_percentage = sample.usage_percentage();
        let gc_request = self.controller.on_tick(sample.timestamp, usage_percentage);

        let mut events = vec![EngineEvent::UsageUpdated {
            timestamp: sample.timestamp,
            used: sample.used,
            limit: sample.limit,
            usage_percentage,
            severity,
        }];

        if severity == Severity::Warning && self.last_severity == Severity::Normal {
            events.push(EngineEvent::WarningCrossed {
                timestamp: sample.timestamp,
                usage_percentage,
            });
        }
        if severity == Severity::Critical && self.last_severity < Severity::Critical {
            events.push(EngineEvent::CriticalCrossed {
                timestamp: sample.timestamp,
                usage_percentage,
            });
        }
        if analysis.is_leaking && !self.was_leaking {
            events.push(EngineEvent::LeakDetected {
                timestamp: sample.timestamp,
                probability: analysis.probability,
                recommendation: analysis.recommendation.clone(),
            });
        }
        if let Some(request) = gc_request {
            events.push(EngineEvent::AutoGcTriggered(request));
        }

        debug!(
            tick = self.ticks,
            used = sample.used,
            usage_percentage = usage_percentage,
            severity = %severity,
            trend = %analysis.trend,
            leak_probability = analysis.probability,
            events = events.len(),
            "Analysis pass complete"
        );

        self.last_severity = severity;
        self.was_leaking = analysis.is_leaking;
        self.last_analysis = analysis.clone();

        TickReport {
            sample,
            usage_percentage,
            severity,
            analysis,
            gc_request,
            events,
        }
    }

    /// Request collection now, bypassing the cooldown
    ///
    /// The request is stamped with [`MemoryEngine::clock`], so the cooldown
    /// it starts is compared against later sample timestamps.
    pub fn force_gc(&mut self) -> GcRequest {
        let now = self.clock();
        let usage = self
            .history
            .latest()
            .map(|s| s.usage_percentage())
            .unwrap_or(0.0);
        info!(now = now, usage_percentage = usage, "Forced GC requested");
        self.controller.force(now, usage)
    }

    /// Classification to freeze into a snapshot
    pub fn current_context(&self) -> AnalysisContext {
        AnalysisContext {
            trend: self.last_analysis.trend,
            leak_probability: self.last_analysis.probability,
            severity: self.last_severity,
            usage_percentage: self
                .history
                .latest()
                .map(|s| s.usage_percentage())
                .unwrap_or(0.0),
        }
    }

    /// Capture the latest sample together with the current classification
    pub fn capture_snapshot(
        &mut self,
        label: &str,
        is_auto: bool,
    ) -> Result<CaptureReport, EngineError> {
        let sample = *self.history.latest().ok_or(EngineError::NoSamples)?;
        let context = self.current_context();
        let snapshot = self.snapshots.capture(label, is_auto, &sample, context)?;

        info!(
            snapshot_id = snapshot.id,
            label = %snapshot.label,
            is_auto = is_auto,
            heap_used = snapshot.heap_used,
            "Snapshot captured"
        );
        Ok(CaptureReport {
            events: vec![EngineEvent::from(&snapshot)],
            snapshot,
        })
    }

    pub fn delete_snapshot(&mut self, id: u64) -> bool {
        self.snapshots.delete(id)
    }

    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.list()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Field deltas from snapshot `from` to snapshot `to`
    pub fn compare_snapshots(&self, from: u64, to: u64) -> Result<SnapshotComparison, EngineError> {
        let a = self.snapshots.get(from).ok_or(SnapshotError::NotFound(from))?;
        let b = self.snapshots.get(to).ok_or(SnapshotError::NotFound(to))?;
        Ok(compare_snapshots(a, b))
    }

    /// Apply a new configuration
    ///
    /// History and snapshots keep their newest entries when shrunk. The
    /// controller keeps its last trigger time. Returns the snapshot interval
    /// the schedule owner should switch to.
    pub fn reconfigure(&mut self, config: EngineConfig) -> SnapshotInterval {
        let config = config.normalized();

        self.history.resize(config.history_capacity);
        self.analyzer = LeakAnalyzer::new(
            config.leak_detection.sensitivity,
            config.leak_detection.enabled,
        );
        self.controller.set_config(config.auto_gc);
        self.snapshots.set_auto_evict(config.snapshots.auto_evict);
        self.snapshots
            .set_max_snapshots(config.snapshots.max_snapshots);

        info!(
            sensitivity = %config.leak_detection.sensitivity,
            history_capacity = config.history_capacity,
            max_snapshots = config.snapshots.max_snapshots,
            auto_interval = %config.snapshots.auto_interval,
            "Engine reconfigured"
        );

        let interval = config.snapshots.auto_interval;
        self.config = config;
        interval
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::leaking_series;
    use crate::analysis::Sensitivity;
    use crate::config::SnapshotConfig;
    use crate::remediation::AutoGcConfig;

    fn at_percent(ts: u64, percent: u64) -> Sample {
        Sample::new(ts, percent, 100, 100)
    }

    fn event_names(report: &TickReport) -> Vec<&'static str> {
        report.events.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn test_usage_update_every_tick() {
        let mut engine = MemoryEngine::default();
        for i in 0..5 {
            let report = engine.tick(at_percent(i * 1000, 10));
            assert_eq!(event_names(&report), vec!["usage_updated"]);
        }
        assert_eq!(engine.tick_count(), 5);
    }

    #[test]
    fn test_threshold_events_fire_on_transition_only() {
        let mut engine = MemoryEngine::default();

        assert_eq!(engine.tick(at_percent(0, 50)).severity, Severity::Normal);

        let report = engine.tick(at_percent(1, 85));
        assert_eq!(report.severity, Severity::Warning);
        assert!(event_names(&report).contains(&"warning_crossed"));

        let report = engine.tick(at_percent(2, 86));
        assert!(!event_names(&report).contains(&"warning_crossed"));

        let report = engine.tick(at_percent(3, 95));
        assert_eq!(report.severity, Severity::Critical);
        assert!(event_names(&report).contains(&"critical_crossed"));

        let report = engine.tick(at_percent(4, 96));
        assert!(!event_names(&report).contains(&"critical_crossed"));

        // Dropping back to warning is not a new crossing from normal
        let report = engine.tick(at_percent(5, 80));
        assert!(!event_names(&report).contains(&"warning_crossed"));
    }

    #[test]
    fn test_leak_event_fires_once() {
        let mut engine = MemoryEngine::default();
        let mut leak_events = 0;
        for sample in leaking_series() {
            let report = engine.tick(sample);
            leak_events += report
                .events
                .iter()
                .filter(|e| matches!(e, EngineEvent::LeakDetected { .. }))
                .count();
        }

        assert!(engine.last_analysis().is_leaking);
        assert_eq!(leak_events, 1);
    }

    #[test]
    fn test_auto_gc_through_engine() {
        let mut engine = MemoryEngine::new(EngineConfig {
            auto_gc: AutoGcConfig {
                enabled: true,
                threshold: Some(80.0),
                cooldown_ms: 10_000,
            },
            ..Default::default()
        });

        assert!(engine.tick(at_percent(0, 85)).gc_request.is_some());
        assert!(engine.tick(at_percent(3_000, 85)).gc_request.is_none());
        let report = engine.tick(at_percent(11_000, 85));
        assert!(report.gc_request.is_some());
        assert!(event_names(&report).contains(&"auto_gc_triggered"));
    }

    #[test]
    fn test_capture_requires_a_sample() {
        let mut engine = MemoryEngine::default();
        assert_eq!(
            engine.capture_snapshot("early", false),
            Err(EngineError::NoSamples)
        );
    }

    #[test]
    fn test_capture_freezes_context() {
        let mut engine = MemoryEngine::default();
        engine.tick(at_percent(0, 95));

        let snapshot = engine.capture_snapshot("peak", false).unwrap().snapshot;
        assert_eq!(snapshot.analysis_context.severity, Severity::Critical);
        assert_eq!(snapshot.analysis_context.usage_percentage, 95.0);

        engine.tick(at_percent(1, 10));
        let stored = &engine.list_snapshots()[0];
        assert_eq!(stored.analysis_context.severity, Severity::Critical);
    }

    #[test]
    fn test_capture_reports_snapshot_event() {
        let mut engine = MemoryEngine::default();
        engine.tick(at_percent(0, 40));

        let manual = engine.capture_snapshot("manual", false).unwrap();
        assert_eq!(
            manual.events,
            vec![EngineEvent::SnapshotCaptured {
                snapshot_id: 1,
                label: "manual".to_string(),
                is_auto: false,
            }]
        );

        let auto = engine.capture_snapshot("", true).unwrap();
        assert!(matches!(
            &auto.events[..],
            [EngineEvent::SnapshotCaptured { snapshot_id: 2, is_auto: true, .. }]
        ));
        assert_eq!(auto.events[0].name(), "snapshot_captured");
    }

    #[test]
    fn test_capacity_rejection_surfaces() {
        let mut engine = MemoryEngine::new(EngineConfig {
            snapshots: SnapshotConfig {
                max_snapshots: 1,
                auto_evict: false,
                ..Default::default()
            },
            ..Default::default()
        });
        engine.tick(at_percent(0, 10));
        engine.capture_snapshot("one", false).unwrap();

        let err = engine.capture_snapshot("two", false).unwrap_err();
        assert_eq!(err.code(), "capacity_exceeded");
        assert_eq!(engine.snapshot_count(), 1);
    }

    #[test]
    fn test_compare_missing_snapshot() {
        let mut engine = MemoryEngine::default();
        engine.tick(at_percent(0, 10));
        let snap = engine.capture_snapshot("a", false).unwrap().snapshot;

        let err = engine.compare_snapshots(snap.id, 99).unwrap_err();
        assert_eq!(err, EngineError::Snapshot(SnapshotError::NotFound(99)));
        assert!(engine.compare_snapshots(snap.id, snap.id).is_ok());
    }

    #[test]
    fn test_force_gc_resets_cooldown() {
        let mut engine = MemoryEngine::new(EngineConfig {
            auto_gc: AutoGcConfig {
                enabled: true,
                threshold: Some(50.0),
                cooldown_ms: 10_000,
            },
            ..Default::default()
        });
        engine.tick(at_percent(1_000, 20));
        let forced = engine.force_gc();
        assert_eq!(forced.timestamp, 1_000);
        assert_eq!(engine.gc_state(), GcState::Cooldown);

        assert!(engine.tick(at_percent(3_000, 90)).gc_request.is_none());
        assert!(engine.tick(at_percent(10_999, 90)).gc_request.is_none());
        assert!(engine.tick(at_percent(11_000, 90)).gc_request.is_some());
    }

    #[test]
    fn test_clock_follows_samples() {
        let mut engine = MemoryEngine::default();
        assert_eq!(engine.clock(), 0);
        assert_eq!(engine.force_gc().timestamp, 0);

        engine.tick(at_percent(42, 10));
        assert_eq!(engine.clock(), 42);
        assert_eq!(engine.gc_state(), GcState::Cooldown);
    }

    #[test]
    fn test_reconfigure_resizes_and_switches_sensitivity() {
        let mut engine = MemoryEngine::default();
        for sample in leaking_series() {
            engine.tick(sample);
        }
        for _ in 0..4 {
            engine.capture_snapshot("", false).unwrap();
        }

        let interval = engine.reconfigure(EngineConfig {
            history_capacity: 5,
            leak_detection: crate::config::LeakDetectionConfig {
                enabled: true,
                sensitivity: Sensitivity::Low,
            },
            snapshots: SnapshotConfig {
                max_snapshots: 2,
                auto_interval: SnapshotInterval::FiveMinutes,
                auto_evict: true,
            },
            ..Default::default()
        });

        assert_eq!(interval, SnapshotInterval::FiveMinutes);
        assert_eq!(engine.history().len(), 5);
        assert_eq!(engine.snapshot_count(), 2);
        assert_eq!(engine.config().leak_detection.sensitivity, Sensitivity::Low);
    }
}
