//! Credential checks in front of the proxy routes
//!
//! Three shapes exist in the wild: credentials in the query string (most
//! players), in a url-encoded POST body (app-style clients), and embedded in
//! the stream path (`/live/{user}/{pass}/{id}`).

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::AppState;

/// Largest request body read while looking for credentials
const MAX_AUTH_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Default)]
struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

impl Credentials {
    fn from_urlencoded(input: &[u8]) -> Self {
        let mut creds = Credentials::default();
        for (key, value) in url::form_urlencoded::parse(input) {
            let slot = match key.as_ref() {
                "username" => &mut creds.username,
                "password" => &mut creds.password,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        creds
    }

    fn or(self, fallback: Credentials) -> Self {
        Credentials {
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
        }
    }

    /// Presence check first, then comparison
    fn verify(&self, config: &ProxyConfig) -> Result<(), ProxyError> {
        let username = non_empty(&self.username).ok_or_else(|| ProxyError::missing("username"))?;
        let password = non_empty(&self.password).ok_or_else(|| ProxyError::missing("password"))?;
        verify_path_credentials(config, username, password)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

async fn read_body(body: Body) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(body, MAX_AUTH_BODY_BYTES)
        .await
        .map_err(|e| {
            error!("Failed to read request body: {}", e);
            ProxyError::internal(e)
        })
}

/// Compare credentials against the configured pair
pub fn verify_path_credentials(
    config: &ProxyConfig,
    username: &str,
    password: &str,
) -> Result<(), ProxyError> {
    if config.credentials_match(username, password) {
        Ok(())
    } else {
        warn!("Rejected credentials for user '{}'", username);
        Err(ProxyError::Unauthorized)
    }
}

/// Query-string credentials, with url-encoded POST bodies as a fallback
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    let query = Credentials::from_urlencoded(request.uri().query().unwrap_or("").as_bytes());

    let request = if request.method() == Method::POST && is_form(&request) {
        let (parts, body) = request.into_parts();
        let bytes = read_body(body).await?;
        query
            .or(Credentials::from_urlencoded(&bytes))
            .verify(&state.proxy)?;
        Request::from_parts(parts, Body::from(bytes))
    } else {
        query.verify(&state.proxy)?;
        request
    };

    Ok(next.run(request).await)
}

/// Credentials from a url-encoded request body
///
/// The body is buffered and handed on unchanged so the handler can parse the
/// action parameters from it.
pub async fn app_authenticate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let bytes = read_body(body).await?;

    Credentials::from_urlencoded(&bytes).verify(&state.proxy)?;

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
