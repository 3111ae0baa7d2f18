//! Heapwatch agent
//!
//! Samples one process (or accepts pushed samples), runs the memory engine
//! on every sample and serves the control API.

use anyhow::{Context, Result};
use heapwatch_agent::{
    api,
    config::AgentConfig,
    runtime,
    sampler::{ProcSampleSource, PushSampleSource, SampleSender, SampleSource},
    AppState,
};
use heapwatch_lib::{
    health::components, HealthRegistry, MemoryEngine, SnapshotSchedule, StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AgentConfig::load().context("Failed to load agent configuration")?;
    info!(
        source = %config.source_label(),
        api_port = config.api_port,
        "Agent configured"
    );

    let polling = Duration::from_millis(config.engine.polling_interval_ms);
    let (source, push): (Box<dyn SampleSource>, Option<SampleSender>) = match config.target_pid {
        Some(pid) => (
            Box::new(ProcSampleSource::new(
                pid,
                &config.proc_root,
                &config.cgroup_root,
                polling,
            )),
            None,
        ),
        None => {
            let (sender, source) = PushSampleSource::channel(64);
            (Box::new(source), Some(sender))
        }
    };

    let health = HealthRegistry::new();
    health.register(components::SAMPLER).await;
    health.register(components::SCHEDULE).await;

    let logger = StructuredLogger::new(source.describe());
    logger.log_startup(AGENT_VERSION, config.engine.polling_interval_ms);

    let engine = MemoryEngine::new(config.engine.clone());
    let (mut schedule, captures) = SnapshotSchedule::new(8);
    schedule.set_interval(engine.config().snapshots.auto_interval);

    let state = Arc::new(AppState::new(
        engine,
        schedule,
        health.clone(),
        logger.clone(),
        push,
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let loop_handle = tokio::spawn(runtime::run(
        state.clone(),
        source,
        captures,
        shutdown_tx.subscribe(),
    ));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        state.clone(),
        shutdown_tx.subscribe(),
    ));

    health.set_ready().await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health.set_not_ready("Agent shutting down").await;
    let _ = shutdown_tx.send(());

    if let Err(e) = loop_handle.await {
        error!(error = %e, "Sampling loop panicked");
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server panicked"),
        Ok(Ok(())) => {}
    }
    state.schedule.lock().await.stop();

    info!("Shutdown complete");
    Ok(())
}
