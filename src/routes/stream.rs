//! Media passthrough routes
//!
//! Every handler checks the proxy credentials before touching the upstream,
//! then hands the resolved target to the shared relay.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::ProxyError;
use crate::routes::auth::verify_path_credentials;
use crate::services::relay::StreamTarget;
use crate::services::xtream::XtreamCredentials;
use crate::AppState;

fn backend_credentials(state: &AppState) -> Result<&XtreamCredentials, ProxyError> {
    match &state.backend {
        Some(backend) => Ok(backend.credentials()),
        None => {
            error!("Stream requested but no Xtream backend is configured");
            Err(ProxyError::Internal(
                "xtream backend not configured".to_string(),
            ))
        }
    }
}

/// Relay `/{kind}/{backend user}/{backend pass}/{rest}` from the backend
async fn relay_backend_path(
    state: &AppState,
    kind: &str,
    rest: &str,
    headers: &HeaderMap,
) -> Result<Response, ProxyError> {
    let creds = backend_credentials(state)?;
    let target = StreamTarget::direct(&creds.stream_url(kind, rest))?;
    debug!("Relaying {} stream {}", kind, rest);
    state.relay.relay(&target, headers).await
}

/// GET /live/:username/:password/:id
pub async fn live(
    State(state): State<Arc<AppState>>,
    Path((username, password, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    verify_path_credentials(&state.proxy, &username, &password)?;
    relay_backend_path(&state, "live", &id, &headers).await
}

/// GET /movie/:username/:password/:id
pub async fn movie(
    State(state): State<Arc<AppState>>,
    Path((username, password, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    verify_path_credentials(&state.proxy, &username, &password)?;
    relay_backend_path(&state, "movie", &id, &headers).await
}

/// GET /series/:username/:password/:id
pub async fn series(
    State(state): State<Arc<AppState>>,
    Path((username, password, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    verify_path_credentials(&state.proxy, &username, &password)?;
    relay_backend_path(&state, "series", &id, &headers).await
}

/// GET /timeshift/:username/:password/:duration/:start/:id
pub async fn timeshift(
    State(state): State<Arc<AppState>>,
    Path((username, password, duration, start, id)): Path<(String, String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    verify_path_credentials(&state.proxy, &username, &password)?;
    let rest = format!("{}/{}/{}", duration, start, id);
    relay_backend_path(&state, "timeshift", &rest, &headers).await
}

/// GET /track/:username/:password/:index/:id
///
/// `index` addresses a track of the source playlist. An `id` ending in
/// `.m3u8` fetches that sub-manifest next to the track URI.
pub async fn track(
    State(state): State<Arc<AppState>>,
    Path((username, password, index, id)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    verify_path_credentials(&state.proxy, &username, &password)?;

    let track = index
        .parse::<usize>()
        .ok()
        .and_then(|i| state.tracks.get(i))
        .ok_or_else(|| ProxyError::NotFound(format!("track {} not found", index)))?;

    let target = StreamTarget::resolve(&track.uri, Some(&id))?;
    debug!(
        "Relaying track {} ({}, group {:?}, duration {}) as {}",
        index,
        track.name,
        track.group(),
        track.duration,
        target
    );
    state.relay.relay(&target, &headers).await
}

/// GET /xmltv.php
pub async fn xmltv(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    let creds = backend_credentials(&state)?;
    let target = StreamTarget::direct(&creds.epg_url())?;
    state.relay.relay(&target, &headers).await
}
