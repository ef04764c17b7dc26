//! Request-level error type shared by the API and relay handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors surfaced to proxy clients
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A required parameter is absent from the request
    #[error("missing {0:?}")]
    MissingParam(String),
    /// Credential mismatch
    #[error("unauthorized")]
    Unauthorized,
    /// Unknown track index, missing playlist file
    #[error("{0}")]
    NotFound(String),
    /// URL parse failure, connection failure, backend failure
    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub fn missing(field: &str) -> Self {
        ProxyError::MissingParam(field.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ProxyError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingParam(_) => StatusCode::BAD_REQUEST,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_param_names_field() {
        let err = ProxyError::missing("vod_id");
        assert_eq!(err.to_string(), "missing \"vod_id\"");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::NotFound("track 3".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
