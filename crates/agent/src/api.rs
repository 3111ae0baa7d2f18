//! HTTP API for health checks, Prometheus metrics and engine control

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use heapwatch_lib::{
    ComponentStatus, EngineConfig, EngineError, GcRequest, GcState, LeakAnalysis, RawSample,
    Sample, Severity, SnapshotError,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub enum ApiError {
    Engine(EngineError),
    PushDisabled,
    Unavailable(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, code) = match self {
            ApiError::Engine(e) => {
                let status = match &e {
                    EngineError::Snapshot(SnapshotError::NotFound(_)) => StatusCode::NOT_FOUND,
                    EngineError::Snapshot(SnapshotError::CapacityExceeded { .. })
                    | EngineError::NoSamples => StatusCode::CONFLICT,
                };
                (status, e.to_string(), e.code().to_string())
            }
            ApiError::PushDisabled => (
                StatusCode::CONFLICT,
                "agent samples a process; pushed samples are not accepted".to_string(),
                "push_disabled".to_string(),
            ),
            ApiError::Unavailable(reason) => (
                StatusCode::SERVICE_UNAVAILABLE,
                reason,
                "unavailable".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error, code })).into_response()
    }
}

/// Current engine view
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub source: String,
    pub sample: Option<Sample>,
    pub usage_percentage: f64,
    pub severity: Severity,
    pub analysis: LeakAnalysis,
    pub gc_state: GcState,
    pub last_gc_at: Option<u64>,
    pub history_len: usize,
    pub history_capacity: usize,
    pub snapshot_count: usize,
    pub ticks: u64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureRequest {
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub a: u64,
    pub b: u64,
}

/// Health check - 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let engine = state.engine.lock().await;
    let sample = engine.latest_sample().copied();

    Json(StatusResponse {
        source: state.logger.source().to_string(),
        usage_percentage: sample.map(|s| s.usage_percentage()).unwrap_or(0.0),
        sample,
        severity: engine.last_severity(),
        analysis: engine.last_analysis().clone(),
        gc_state: engine.gc_state(),
        last_gc_at: engine.last_gc_trigger(),
        history_len: engine.history().len(),
        history_capacity: engine.history().capacity(),
        snapshot_count: engine.snapshot_count(),
        ticks: engine.tick_count(),
    })
}

/// Oldest first; `limit` keeps the newest N
async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<Sample>> {
    let engine = state.engine.lock().await;
    let all = engine.history().all();
    let skip = query
        .limit
        .map(|limit| all.len().saturating_sub(limit))
        .unwrap_or(0);
    Json(all[skip..].to_vec())
}

async fn push_sample(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawSample>,
) -> Result<(StatusCode, Json<Sample>), ApiError> {
    let sender = state.push.as_ref().ok_or(ApiError::PushDisabled)?;
    let sample = sender
        .push(raw)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(sample)))
}

async fn force_gc(State(state): State<Arc<AppState>>) -> Json<GcRequest> {
    Json(state.force_gc().await)
}

async fn list_snapshots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.lock().await.list_snapshots())
}

async fn capture_snapshot(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CaptureRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let snapshot = state.capture_snapshot(&request.label, false).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn delete_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if state.delete_snapshot(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(EngineError::Snapshot(SnapshotError::NotFound(id)).into())
    }
}

async fn compare_snapshots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompareQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let comparison = state
        .engine
        .lock()
        .await
        .compare_snapshots(query.a, query.b)?;
    Ok(Json(comparison))
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<EngineConfig> {
    Json(state.engine.lock().await.config().clone())
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<EngineConfig>,
) -> Json<EngineConfig> {
    Json(state.apply_config(config).await)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/history", get(history))
        .route("/api/v1/samples", post(push_sample))
        .route("/api/v1/gc", post(force_gc))
        .route(
            "/api/v1/snapshots",
            get(list_snapshots).post(capture_snapshot),
        )
        .route("/api/v1/snapshots/compare", get(compare_snapshots))
        .route("/api/v1/snapshots/:id", delete(delete_snapshot))
        .route("/api/v1/config", get(get_config).put(put_config))
        .with_state(state)
}

/// Serve the API until shutdown is signalled
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
