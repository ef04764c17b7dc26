//! player_api.php action routing
//!
//! Maps the fixed set of Xtream action names onto backend calls. Required
//! parameters are checked before anything is sent upstream; unknown or absent
//! actions fall through to the login response.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::services::aggregator::collect_all_series;
use crate::services::login::build_login_response;
use crate::services::metrics::API_ACTIONS;
use crate::services::xtream::{XtreamBackend, XtreamError};

/// The Player API actions the proxy understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    LiveCategories,
    LiveStreams,
    VodCategories,
    VodStreams,
    VodInfo,
    SeriesCategories,
    Series,
    SeriesInfo,
    ShortEpg,
    SimpleDataTable,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::LiveCategories,
        Action::LiveStreams,
        Action::VodCategories,
        Action::VodStreams,
        Action::VodInfo,
        Action::SeriesCategories,
        Action::Series,
        Action::SeriesInfo,
        Action::ShortEpg,
        Action::SimpleDataTable,
    ];

    /// Look up an action by its wire name; anything else is `None`
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::LiveCategories => "get_live_categories",
            Action::LiveStreams => "get_live_streams",
            Action::VodCategories => "get_vod_categories",
            Action::VodStreams => "get_vod_streams",
            Action::VodInfo => "get_vod_info",
            Action::SeriesCategories => "get_series_categories",
            Action::Series => "get_series",
            Action::SeriesInfo => "get_series_info",
            Action::ShortEpg => "get_short_epg",
            Action::SimpleDataTable => "get_simple_data_table",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action parameters from the query string or a url-encoded body
///
/// Credentials are deliberately not part of this struct so it can be logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiParams {
    pub action: Option<String>,
    pub category_id: Option<String>,
    pub vod_id: Option<String>,
    pub series_id: Option<String>,
    pub stream_id: Option<String>,
    pub limit: Option<String>,
}

impl ApiParams {
    /// Collect parameters from decoded pairs; the first occurrence of a key wins
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = ApiParams::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "action" => &mut params.action,
                "category_id" => &mut params.category_id,
                "vod_id" => &mut params.vod_id,
                "series_id" => &mut params.series_id,
                "stream_id" => &mut params.stream_id,
                "limit" => &mut params.limit,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        params
    }

    /// Parse an `a=b&c=d` string
    pub fn from_urlencoded(input: &[u8]) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(input).into_owned())
    }

    /// Fill parameters missing here from `fallback`
    pub fn or(self, fallback: ApiParams) -> Self {
        ApiParams {
            action: self.action.or(fallback.action),
            category_id: self.category_id.or(fallback.category_id),
            vod_id: self.vod_id.or(fallback.vod_id),
            series_id: self.series_id.or(fallback.series_id),
            stream_id: self.stream_id.or(fallback.stream_id),
            limit: self.limit.or(fallback.limit),
        }
    }

    fn category_filter(&self) -> &str {
        self.category_id.as_deref().unwrap_or("")
    }
}

/// A parameter is present when it appears in the request, even if empty
fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ProxyError> {
    value.as_deref().ok_or_else(|| ProxyError::missing(name))
}

/// Parse the optional short-EPG limit
///
/// A malformed limit is reported as an internal error rather than a bad
/// request; clients in the wild depend on that status.
fn parse_limit(limit: Option<&str>) -> Result<i64, ProxyError> {
    match limit {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse().map_err(|e| {
            error!("Error parsing limit '{}': {}", raw, e);
            ProxyError::Internal(format!("invalid limit {:?}: {}", raw, e))
        }),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ProxyError> {
    serde_json::to_value(value).map_err(|e| {
        error!("Serialization error: {}", e);
        ProxyError::internal(e)
    })
}

fn backend_error(action: Action, err: XtreamError) -> ProxyError {
    error!("Xtream API error for '{}': {}", action, err);
    ProxyError::Internal(err.to_string())
}

/// Per-request router from action names to backend calls
pub struct ActionDispatcher {
    backend: Arc<dyn XtreamBackend>,
    config: Arc<ProxyConfig>,
}

impl ActionDispatcher {
    pub fn new(backend: Arc<dyn XtreamBackend>, config: Arc<ProxyConfig>) -> Self {
        Self { backend, config }
    }

    /// Execute the action named in `params` and return the JSON payload
    pub async fn dispatch(&self, params: &ApiParams) -> Result<Value, ProxyError> {
        let name = params.action.as_deref().unwrap_or("");
        info!("Action called: '{}' with params: {:?}", name, params);

        let Some(action) = Action::parse(name) else {
            API_ACTIONS.with_label_values(&["login"]).inc();
            return to_json(build_login_response(&self.config, self.backend.account()));
        };
        API_ACTIONS.with_label_values(&[action.as_str()]).inc();

        let result = self.run(action, params).await;
        match &result {
            Ok(_) => debug!("Action '{}' completed", action),
            Err(e) => warn!("Action '{}' failed: {}", action, e),
        }
        result
    }

    async fn run(&self, action: Action, params: &ApiParams) -> Result<Value, ProxyError> {
        let backend = &self.backend;
        let fail = |e| backend_error(action, e);

        match action {
            Action::LiveCategories => to_json(backend.live_categories().await.map_err(fail)?),
            Action::LiveStreams => to_json(
                backend
                    .live_streams(params.category_filter())
                    .await
                    .map_err(fail)?,
            ),
            Action::VodCategories => to_json(backend.vod_categories().await.map_err(fail)?),
            Action::VodStreams => to_json(
                backend
                    .vod_streams(params.category_filter())
                    .await
                    .map_err(fail)?,
            ),
            Action::VodInfo => {
                let vod_id = require(&params.vod_id, "vod_id")?;
                to_json(backend.vod_info(vod_id).await.map_err(fail)?)
            }
            Action::SeriesCategories => {
                let categories = backend.series_categories().await.map_err(fail)?;
                info!("Found {} series categories", categories.len());
                to_json(categories)
            }
            Action::Series => {
                let category_id = params.category_filter();
                if category_id.is_empty() {
                    let aggregated = collect_all_series(Arc::clone(backend))
                        .await
                        .map_err(fail)?;
                    to_json(aggregated.series)
                } else {
                    self.series_in_category(category_id).await
                }
            }
            Action::SeriesInfo => {
                let series_id = require(&params.series_id, "series_id")?;
                to_json(backend.series_info(series_id).await.map_err(fail)?)
            }
            Action::ShortEpg => {
                let stream_id = require(&params.stream_id, "stream_id")?;
                let limit = parse_limit(params.limit.as_deref())?;
                to_json(backend.short_epg(stream_id, limit).await.map_err(fail)?)
            }
            Action::SimpleDataTable => {
                let stream_id = require(&params.stream_id, "stream_id")?;
                to_json(backend.simple_data_table(stream_id).await.map_err(fail)?)
            }
        }
    }

    /// Series of one category, falling back to filtering the full listing
    async fn series_in_category(&self, category_id: &str) -> Result<Value, ProxyError> {
        match self.backend.series(category_id).await {
            Ok(series) => {
                info!("Found {} series in category {}", series.len(), category_id);
                to_json(series)
            }
            Err(err) => {
                warn!(
                    "Error getting series for category {}: {}; filtering full listing",
                    category_id, err
                );
                match self.backend.series("").await {
                    Ok(all) => {
                        let filtered: Vec<_> = all
                            .into_iter()
                            .filter(|s| s.in_category(category_id))
                            .collect();
                        info!(
                            "Filtered {} series for category {}",
                            filtered.len(),
                            category_id
                        );
                        to_json(filtered)
                    }
                    Err(fallback_err) => {
                        warn!("Full series listing also failed: {}", fallback_err);
                        Err(backend_error(Action::Series, err))
                    }
                }
            }
        }
    }
}
