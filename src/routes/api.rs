use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::error::ProxyError;
use crate::services::dispatcher::{ActionDispatcher, ApiParams};
use crate::AppState;

fn dispatcher(state: &AppState) -> Result<ActionDispatcher, ProxyError> {
    let backend = state.backend.clone().ok_or_else(|| {
        error!("player_api.php called but no Xtream backend is configured");
        ProxyError::Internal("xtream backend not configured".to_string())
    })?;
    Ok(ActionDispatcher::new(backend, Arc::clone(&state.proxy)))
}

/// GET /player_api.php
pub async fn player_api_get(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, ProxyError> {
    let params = ApiParams::from_urlencoded(query.unwrap_or_default().as_bytes());
    dispatcher(&state)?.dispatch(&params).await.map(Json)
}

/// POST /player_api.php, body parameters first, query as fallback
pub async fn player_api_post(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<Value>, ProxyError> {
    let params = ApiParams::from_urlencoded(&body)
        .or(ApiParams::from_urlencoded(query.unwrap_or_default().as_bytes()));
    dispatcher(&state)?.dispatch(&params).await.map(Json)
}
