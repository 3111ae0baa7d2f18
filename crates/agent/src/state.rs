//! Shared agent state
//!
//! The engine and the snapshot schedule sit behind async mutexes; the run
//! loop and the API handlers both go through the methods here so every
//! mutation is logged and reflected in metrics the same way.

use crate::sampler::SampleSender;
use heapwatch_lib::health::components;
use heapwatch_lib::snapshot::ScheduledCapture;
use heapwatch_lib::{
    EngineConfig, EngineError, EngineEvent, EngineMetrics, GcRequest, HealthRegistry,
    LeakAnalysis, MemoryEngine, Sample, Snapshot, SnapshotSchedule, StructuredLogger, TickReport,
};
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Buffered events per subscriber before it starts lagging
const EVENT_BUFFER: usize = 256;

pub struct AppState {
    pub engine: Mutex<MemoryEngine>,
    pub schedule: Mutex<SnapshotSchedule>,
    pub health: HealthRegistry,
    pub metrics: EngineMetrics,
    pub logger: StructuredLogger,
    /// Present in push mode only
    pub push: Option<SampleSender>,
    events: broadcast::Sender<EngineEvent>,
}

impl AppState {
    pub fn new(
        engine: MemoryEngine,
        schedule: SnapshotSchedule,
        health: HealthRegistry,
        logger: StructuredLogger,
        push: Option<SampleSender>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            engine: Mutex::new(engine),
            schedule: Mutex::new(schedule),
            health,
            metrics: EngineMetrics::new(),
            logger,
            push,
            events,
        }
    }

    /// Receive every event dispatched after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Send events to metrics, logs and subscribers
    fn dispatch(&self, events: &[EngineEvent], analysis: Option<&LeakAnalysis>) {
        for event in events {
            self.metrics.record_event(event);
            match event {
                EngineEvent::LeakDetected { .. } => {
                    if let Some(analysis) = analysis {
                        self.logger.log_leak_detected(analysis);
                    }
                }
                EngineEvent::AutoGcTriggered(request) => {
                    self.metrics.record_gc_request(request);
                    self.logger.log_gc_request(request);
                }
                EngineEvent::SnapshotCaptured {
                    snapshot_id,
                    label,
                    is_auto,
                } => self.logger.log_snapshot(*snapshot_id, label, *is_auto),
                _ => {}
            }
            // No subscribers is fine
            let _ = self.events.send(event.clone());
        }
    }

    /// Run one engine tick and dispatch its events
    pub async fn process_sample(&self, sample: Sample) -> TickReport {
        let start = Instant::now();
        let (previous, report, snapshots) = {
            let mut engine = self.engine.lock().await;
            let previous = engine.last_severity();
            let report = engine.tick(sample);
            (previous, report, engine.snapshot_count())
        };

        self.metrics
            .record_tick(&report, start.elapsed().as_secs_f64());
        self.metrics.set_snapshots_stored(snapshots);

        if report.severity != previous {
            self.logger
                .log_severity_change(previous, report.severity, report.usage_percentage);
        }
        self.dispatch(&report.events, Some(&report.analysis));

        self.health.set_healthy(components::SAMPLER).await;
        report
    }

    pub async fn record_sample_error(&self, error: &anyhow::Error) {
        let reason = format!("{:#}", error);
        self.metrics.inc_sample_errors();
        self.logger.log_sample_error(&reason);
        self.health.set_degraded(components::SAMPLER, reason).await;
    }

    pub async fn capture_snapshot(&self, label: &str, is_auto: bool) -> Result<Snapshot, EngineError> {
        let (report, count) = {
            let mut engine = self.engine.lock().await;
            let report = engine.capture_snapshot(label, is_auto)?;
            (report, engine.snapshot_count())
        };
        self.metrics.set_snapshots_stored(count);
        self.dispatch(&report.events, None);
        Ok(report.snapshot)
    }

    pub async fn delete_snapshot(&self, id: u64) -> bool {
        let mut engine = self.engine.lock().await;
        let deleted = engine.delete_snapshot(id);
        self.metrics.set_snapshots_stored(engine.snapshot_count());
        deleted
    }

    /// Handle a request from the auto-capture schedule
    ///
    /// Requests from a schedule that has since been replaced are dropped.
    /// A failed capture marks the schedule degraded until one succeeds.
    pub async fn handle_scheduled_capture(&self, capture: ScheduledCapture) {
        if !self.schedule.lock().await.is_current(&capture) {
            debug!(generation = capture.generation, "Dropping stale scheduled capture");
            return;
        }
        match self.capture_snapshot("", true).await {
            Ok(_) => self.health.set_healthy(components::SCHEDULE).await,
            Err(EngineError::NoSamples) => debug!("Skipping scheduled capture, no samples yet"),
            Err(e) => {
                let reason = format!("scheduled capture failed: {}", e);
                self.logger.log_sample_error(&reason);
                self.health.set_degraded(components::SCHEDULE, reason).await;
            }
        }
    }

    /// Force a GC, stamped on the engine's sample clock
    pub async fn force_gc(&self) -> GcRequest {
        let request = self.engine.lock().await.force_gc();
        self.metrics.record_gc_request(&request);
        self.logger.log_gc_request(&request);
        request
    }

    /// Apply a new engine configuration and restart the schedule if its
    /// interval changed; returns the normalized configuration
    pub async fn apply_config(&self, config: EngineConfig) -> EngineConfig {
        let (interval, applied) = {
            let mut engine = self.engine.lock().await;
            let interval = engine.reconfigure(config);
            (interval, engine.config().clone())
        };

        let mut schedule = self.schedule.lock().await;
        if schedule.interval() != interval {
            schedule.set_interval(interval);
        }
        applied
    }
}
