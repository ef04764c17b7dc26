//! Xtream Codes API Client
//!
//! HTTP client for making requests to Xtream Codes Player API v2.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use super::backend::XtreamBackend;
use super::types::*;

/// Xtream API Error types
#[derive(Debug, Error)]
pub enum XtreamError {
    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),
    /// HTTP error (non-2xx status)
    #[error("HTTP error: {0}")]
    Http(u16),
    /// JSON parsing error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Empty response from server
    #[error("Empty response")]
    EmptyResponse,
    /// Base URL could not be turned into a request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Xtream API Client
///
/// Authenticates once on [`XtreamClient::connect`] and keeps the returned
/// account metadata for the lifetime of the process.
pub struct XtreamClient {
    http: Client,
    creds: XtreamCredentials,
    account: XtreamAuthResponse,
}

impl XtreamClient {
    /// Authenticate against the backend and keep the session
    ///
    /// # Arguments
    /// * `creds` - Backend server and credentials
    /// * `user_agent` - User-Agent sent on every API call
    /// * `timeout` - Per-request timeout for API calls
    pub async fn connect(
        creds: XtreamCredentials,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, XtreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .danger_accept_invalid_certs(true) // Many Xtream servers have self-signed certs
            .build()
            .map_err(|e| XtreamError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let mut client = Self {
            http,
            creds,
            account: XtreamAuthResponse::default(),
        };

        let account: XtreamAuthResponse = client.get_object("", &[]).await?;
        if !account.user_info.is_active() {
            warn!(
                "Xtream account status is '{}' (auth={})",
                account.user_info.status, account.user_info.auth
            );
        }
        info!(
            "Xtream session established with {} (status: {}, expires: {:?})",
            client.creds.server, account.user_info.status, account.user_info.exp_date
        );
        client.account = account;

        Ok(client)
    }

    /// Build the player_api.php URL for an action and its parameters
    fn action_url(&self, action: &str, params: &[(&str, &str)]) -> Result<Url, XtreamError> {
        let mut url = Url::parse(&self.creds.api_url())
            .map_err(|e| XtreamError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("username", &self.creds.username)
                .append_pair("password", &self.creds.password);
            if !action.is_empty() {
                query.append_pair("action", action);
            }
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Make a GET request and return the body text
    async fn fetch(&self, action: &str, params: &[(&str, &str)]) -> Result<String, XtreamError> {
        let url = self.action_url(action, params)?;

        debug!("Xtream API request: {} {:?}", action, params);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| XtreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(XtreamError::Http(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| XtreamError::Network(e.to_string()))?;

        // Some servers return HTML error pages instead of JSON
        if text.trim_start().starts_with('<') {
            return Err(XtreamError::Parse(format!(
                "action '{}' returned HTML instead of JSON",
                action
            )));
        }

        Ok(text)
    }

    /// Fetch a single JSON document
    async fn get_object<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<T, XtreamError> {
        let text = self.fetch(action, params).await?;
        let trimmed = text.trim();

        // Handle empty responses (some endpoints return nothing for unknown ids)
        if trimmed.is_empty() || trimmed == "null" {
            return Err(XtreamError::EmptyResponse);
        }

        serde_json::from_str(trimmed).map_err(|e| {
            error!(
                "Failed to parse Xtream response for action '{}': {}",
                action, e
            );
            debug!(
                "Response text: {}",
                trimmed.chars().take(500).collect::<String>()
            );
            XtreamError::Parse(e.to_string())
        })
    }

    /// Fetch a JSON array, skipping records that do not decode
    async fn get_list<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, XtreamError> {
        let text = self.fetch(action, params).await?;
        decode_list(action, &text)
    }

    fn category_filter(category_id: &str) -> Vec<(&str, &str)> {
        if category_id.is_empty() {
            Vec::new()
        } else {
            vec![("category_id", category_id)]
        }
    }
}

/// Decode a backend listing tolerantly
///
/// Empty bodies, `null` and non-array objects (some servers answer `{}` for an
/// empty category) are treated as an empty list.
fn decode_list<T: DeserializeOwned>(action: &str, text: &str) -> Result<Vec<T>, XtreamError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    let raw: Value = serde_json::from_str(trimmed).map_err(|e| {
        error!(
            "Failed to parse Xtream response for action '{}': {}",
            action, e
        );
        XtreamError::Parse(e.to_string())
    })?;

    let records = match raw {
        Value::Array(records) => records,
        Value::Object(map) if map.is_empty() => return Ok(Vec::new()),
        other => {
            return Err(XtreamError::Parse(format!(
                "action '{}' returned {} instead of a list",
                action,
                json_kind(&other)
            )))
        }
    };

    let total = records.len();
    let decoded: Vec<T> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!("Skipping undecodable '{}' record: {}", action, e);
                None
            }
        })
        .collect();

    if decoded.len() < total {
        warn!(
            "Action '{}': skipped {} of {} records",
            action,
            total - decoded.len(),
            total
        );
    }

    Ok(decoded)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl XtreamBackend for XtreamClient {
    fn account(&self) -> &XtreamAuthResponse {
        &self.account
    }

    fn credentials(&self) -> &XtreamCredentials {
        &self.creds
    }

    async fn live_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.get_list("get_live_categories", &[]).await
    }

    async fn live_streams(&self, category_id: &str) -> Result<Vec<Value>, XtreamError> {
        self.get_list("get_live_streams", &Self::category_filter(category_id))
            .await
    }

    async fn vod_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.get_list("get_vod_categories", &[]).await
    }

    async fn vod_streams(&self, category_id: &str) -> Result<Vec<Value>, XtreamError> {
        self.get_list("get_vod_streams", &Self::category_filter(category_id))
            .await
    }

    async fn vod_info(&self, vod_id: &str) -> Result<Value, XtreamError> {
        self.get_object("get_vod_info", &[("vod_id", vod_id)]).await
    }

    async fn series_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.get_list("get_series_categories", &[]).await
    }

    async fn series(&self, category_id: &str) -> Result<Vec<XtreamSeries>, XtreamError> {
        self.get_list("get_series", &Self::category_filter(category_id))
            .await
    }

    async fn series_info(&self, series_id: &str) -> Result<Value, XtreamError> {
        self.get_object("get_series_info", &[("series_id", series_id)])
            .await
    }

    async fn short_epg(&self, stream_id: &str, limit: i64) -> Result<Value, XtreamError> {
        let limit_param = limit.to_string();
        let mut params = vec![("stream_id", stream_id)];
        if limit != 0 {
            params.push(("limit", limit_param.as_str()));
        }
        self.get_object("get_short_epg", &params).await
    }

    async fn simple_data_table(&self, stream_id: &str) -> Result<Value, XtreamError> {
        self.get_object("get_simple_data_table", &[("stream_id", stream_id)])
            .await
    }
}
