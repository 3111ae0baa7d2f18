//! Observability for the memory engine
//!
//! Provides:
//! - Prometheus metrics (heap usage, leak probability, severity, tick latency)
//! - Structured JSON logging with tracing

use crate::analysis::LeakAnalysis;
use crate::engine::{EngineEvent, TickReport};
use crate::models::Severity;
use crate::remediation::{GcRequest, GcTrigger};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Tick latency buckets (in seconds)
const TICK_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.1,
];

static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    heap_used_bytes: IntGauge,
    heap_limit_bytes: IntGauge,
    usage_ratio: Gauge,
    leak_probability: Gauge,
    severity_level: IntGauge,
    gc_events_in_window: IntGauge,
    snapshots_stored: IntGauge,
    gc_requests: IntCounterVec,
    events: IntCounterVec,
    tick_latency_seconds: Histogram,
    sample_errors: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            heap_used_bytes: register_int_gauge!(
                "heapwatch_heap_used_bytes",
                "Heap bytes in use at the latest sample"
            )
            .expect("Failed to register heap_used_bytes"),

            heap_limit_bytes: register_int_gauge!(
                "heapwatch_heap_limit_bytes",
                "Heap limit at the latest sample, 0 when unknown"
            )
            .expect("Failed to register heap_limit_bytes"),

            usage_ratio: register_gauge!(
                "heapwatch_usage_ratio",
                "Heap used divided by heap limit"
            )
            .expect("Failed to register usage_ratio"),

            leak_probability: register_gauge!(
                "heapwatch_leak_probability",
                "Leak probability (0-100) from the latest analysis pass"
            )
            .expect("Failed to register leak_probability"),

            severity_level: register_int_gauge!(
                "heapwatch_severity_level",
                "Current severity (0 normal, 1 warning, 2 critical)"
            )
            .expect("Failed to register severity_level"),

            gc_events_in_window: register_int_gauge!(
                "heapwatch_gc_events_in_window",
                "GC-like drops detected in the current history window"
            )
            .expect("Failed to register gc_events_in_window"),

            snapshots_stored: register_int_gauge!(
                "heapwatch_snapshots_stored",
                "Snapshots currently held in the store"
            )
            .expect("Failed to register snapshots_stored"),

            gc_requests: register_int_counter_vec!(
                "heapwatch_gc_requests_total",
                "GC requests issued by the engine",
                &["trigger"]
            )
            .expect("Failed to register gc_requests"),

            events: register_int_counter_vec!(
                "heapwatch_events_total",
                "Engine events dispatched to the host",
                &["event"]
            )
            .expect("Failed to register events"),

            tick_latency_seconds: register_histogram!(
                "heapwatch_tick_latency_seconds",
                "Time spent in one analysis pass",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            sample_errors: register_int_counter!(
                "heapwatch_sample_errors_total",
                "Samples that could not be read from the source"
            )
            .expect("Failed to register sample_errors"),
        }
    }
}

/// Handle to the process-wide engine metrics
///
/// Clones share the same registered collectors.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    /// Update the gauges from a finished tick
    pub fn record_tick(&self, report: &TickReport, elapsed_secs: f64) {
        let inner = self.inner();
        inner.heap_used_bytes.set(report.sample.used as i64);
        inner.heap_limit_bytes.set(report.sample.limit as i64);
        inner.usage_ratio.set(report.sample.usage_ratio().unwrap_or(0.0));
        inner.leak_probability.set(report.analysis.probability);
        inner.severity_level.set(report.severity.level());
        inner
            .gc_events_in_window
            .set(report.analysis.gc_event_count as i64);
        inner.tick_latency_seconds.observe(elapsed_secs);
    }

    pub fn record_gc_request(&self, request: &GcRequest) {
        let label = match request.trigger {
            GcTrigger::Automatic => "automatic",
            GcTrigger::Forced => "forced",
        };
        self.inner().gc_requests.with_label_values(&[label]).inc();
    }

    /// Count one dispatched event under its name
    pub fn record_event(&self, event: &EngineEvent) {
        self.inner().events.with_label_values(&[event.name()]).inc();
    }

    /// Dispatched count for one event name
    pub fn event_count(&self, name: &str) -> u64 {
        self.inner().events.with_label_values(&[name]).get()
    }

    pub fn set_snapshots_stored(&self, count: usize) {
        self.inner().snapshots_stored.set(count as i64);
    }

    pub fn inc_sample_errors(&self) {
        self.inner().sample_errors.inc();
    }
}

/// Structured logger for engine events
///
/// Every line carries the `source` being watched so logs from several agents
/// can be told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Log a severity transition
    pub fn log_severity_change(&self, from: Severity, to: Severity, usage_percentage: f64) {
        match to {
            Severity::Critical => error!(
                event = "severity_changed",
                source = %self.source,
                from = %from,
                to = %to,
                usage_percentage = usage_percentage,
                "Heap usage is critical"
            ),
            Severity::Warning => warn!(
                event = "severity_changed",
                source = %self.source,
                from = %from,
                to = %to,
                usage_percentage = usage_percentage,
                "Heap usage crossed the warning threshold"
            ),
            Severity::Normal => info!(
                event = "severity_changed",
                source = %self.source,
                from = %from,
                to = %to,
                usage_percentage = usage_percentage,
                "Heap usage back to normal"
            ),
        }
    }

    pub fn log_leak_detected(&self, analysis: &LeakAnalysis) {
        warn!(
            event = "leak_detected",
            source = %self.source,
            probability = analysis.probability,
            trend = %analysis.trend,
            slope_bytes_per_sample = analysis.slope,
            r_squared = analysis.r_squared,
            gc_events = analysis.gc_event_count,
            recommendation = ?analysis.recommendation,
            "Memory leak suspected"
        );
    }

    pub fn log_gc_request(&self, request: &GcRequest) {
        info!(
            event = "gc_requested",
            source = %self.source,
            trigger = ?request.trigger,
            usage_percentage = request.usage_percentage,
            timestamp = request.timestamp,
            "Garbage collection requested"
        );
    }

    pub fn log_snapshot(&self, snapshot_id: u64, label: &str, is_auto: bool) {
        info!(
            event = "snapshot_captured",
            source = %self.source,
            snapshot_id = snapshot_id,
            label = %label,
            is_auto = is_auto,
            "Snapshot captured"
        );
    }

    pub fn log_sample_error(&self, reason: &str) {
        warn!(
            event = "sample_error",
            source = %self.source,
            reason = %reason,
            "Failed to read heap sample"
        );
    }

    pub fn log_startup(&self, version: &str, polling_interval_ms: u64) {
        info!(
            event = "agent_started",
            source = %self.source,
            agent_version = %version,
            polling_interval_ms = polling_interval_ms,
            "Heapwatch agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            source = %self.source,
            reason = %reason,
            "Heapwatch agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::models::Sample;

    #[test]
    fn test_engine_metrics_record() {
        let metrics = EngineMetrics::new();
        let mut engine = MemoryEngine::default();
        let report = engine.tick(Sample::new(0, 50, 100, 100));

        metrics.record_tick(&report, 0.0001);
        metrics.record_gc_request(&engine.force_gc());
        let before = metrics.event_count("usage_updated");
        for event in &report.events {
            metrics.record_event(event);
        }
        assert!(metrics.event_count("usage_updated") > before);
        metrics.set_snapshots_stored(2);
        metrics.inc_sample_errors();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "heapwatch_usage_ratio"));
    }

    #[test]
    fn test_structured_logger_source() {
        let logger = StructuredLogger::new("pid:42");
        assert_eq!(logger.source(), "pid:42");
        logger.log_severity_change(Severity::Normal, Severity::Warning, 75.0);
    }
}
