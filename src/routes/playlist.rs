use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use crate::error::ProxyError;
use crate::AppState;

/// GET /{m3u_file_name} - download the pre-generated playlist
pub async fn get_m3u(State(state): State<Arc<AppState>>) -> Result<Response, ProxyError> {
    let path = &state.config.m3u_proxified_path;

    let file = tokio::fs::File::open(path).await.map_err(|e| {
        error!("Cannot open playlist {}: {}", path, e);
        if e.kind() == std::io::ErrorKind::NotFound {
            ProxyError::NotFound(format!("playlist {} not found", state.config.m3u_file_name))
        } else {
            ProxyError::internal(e)
        }
    })?;

    info!("Serving playlist {}", state.config.m3u_file_name);

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={:?}", state.config.m3u_file_name),
            ),
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
