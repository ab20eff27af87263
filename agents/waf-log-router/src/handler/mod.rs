//! HTTP handler for the WAF Log Router
//!
//! Invocation entry point for container deployments:
//! - POST /invoke - transform one batch of records
//! - GET /health - liveness and configured streams
//! - GET /metrics - Prometheus exposition

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::contracts::*;
use crate::processor::RecordProcessor;
use crate::telemetry::RouterMetricsRegistry;

/// Application state
pub struct AppState {
    pub processor: RecordProcessor,
    pub metrics: Arc<RouterMetricsRegistry>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the processor to `metrics` and build the state
    pub fn new(processor: RecordProcessor, metrics: Arc<RouterMetricsRegistry>) -> Self {
        Self {
            processor: processor.with_metrics(Arc::clone(&metrics)),
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/invoke", post(invoke))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let channels = state.processor.channels();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        block_stream: channels.block_stream.clone(),
        count_stream: channels.count_stream.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Transform one batch of records
async fn invoke(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TransformationEvent>,
) -> Json<TransformationResponse> {
    let report = state.processor.process(event).await;

    tracing::info!(
        invocation_id = %report.invocation_id,
        records = report.summary.total,
        block = report.summary.block,
        count = report.summary.count,
        failed = report.summary.failed(),
        "processed transformation batch"
    );

    Json(report.response)
}

/// Prometheus scrape endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.metrics.encode_text().map_err(|e| ApiError {
        error: "MetricsError".to_string(),
        message: e.to_string(),
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub block_stream: String,
    pub count_stream: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// API error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}
