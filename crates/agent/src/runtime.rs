//! Sampling loop
//!
//! Pulls samples from the source, runs them through the engine and serves
//! scheduled snapshot captures until shutdown.

use crate::sampler::SampleSource;
use crate::state::AppState;
use heapwatch_lib::snapshot::ScheduledCapture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

pub async fn run(
    state: Arc<AppState>,
    mut source: Box<dyn SampleSource>,
    mut captures: mpsc::Receiver<ScheduledCapture>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(source = %source.describe(), "Starting sampling loop");
    let mut samples = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(samples = samples, "Shutting down sampling loop");
                break;
            }
            next = source.next_sample() => match next {
                Ok(Some(sample)) => {
                    samples += 1;
                    let report = state.process_sample(sample).await;
                    debug!(
                        samples = samples,
                        severity = %report.severity,
                        "Sample processed"
                    );

                    let polling_ms = state.engine.lock().await.config().polling_interval_ms;
                    source.set_polling_interval(Duration::from_millis(polling_ms));
                }
                Ok(None) => {
                    info!("Sample source closed");
                    break;
                }
                Err(e) => state.record_sample_error(&e).await,
            },
            Some(capture) = captures.recv() => {
                state.handle_scheduled_capture(capture).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::PushSampleSource;
    use heapwatch_lib::{HealthRegistry, MemoryEngine, RawSample, SnapshotSchedule, StructuredLogger};

    #[tokio::test]
    async fn test_pushed_samples_reach_engine() {
        let (sender, source) = PushSampleSource::channel(8);
        let (schedule, captures) = SnapshotSchedule::new(4);
        let state = Arc::new(AppState::new(
            MemoryEngine::default(),
            schedule,
            HealthRegistry::new(),
            StructuredLogger::new("push"),
            Some(sender.clone()),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        for ts in 1..=3u64 {
            sender
                .push(RawSample {
                    timestamp: ts * 1000,
                    used: Some(50.0),
                    total: Some(100.0),
                    limit: Some(100.0),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let handle = tokio::spawn(run(state.clone(), Box::new(source), captures, shutdown_rx));
        while state.engine.lock().await.tick_count() < 3 {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let engine = state.engine.lock().await;
        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.latest_sample().map(|s| s.timestamp), Some(3000));
    }
}
