use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "xtream-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Backend session summary; never includes credentials
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendStatus {
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    backend: BackendStatus,
    tracks: usize,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let backend = match &state.backend {
        Some(backend) => BackendStatus {
            configured: true,
            account_status: Some(backend.account().user_info.status.clone()),
        },
        None => BackendStatus {
            configured: false,
            account_status: None,
        },
    };

    // Without a backend only the playlist and /track routes work
    let status = if backend.configured { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime,
        backend,
        tracks: state.tracks.len(),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.backend.is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready - xtream backend unavailable")
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
