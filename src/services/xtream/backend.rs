//! Capability interface over an authenticated Xtream backend session.

use async_trait::async_trait;
use serde_json::Value;

use super::client::XtreamError;
use super::types::{XtreamAuthResponse, XtreamCategory, XtreamCredentials, XtreamSeries};

/// Read-only catalog and EPG operations the proxy performs against the backend
///
/// An empty `category_id` means "no filter" for the listing operations.
#[async_trait]
pub trait XtreamBackend: Send + Sync {
    /// Account and server metadata captured at authentication time
    fn account(&self) -> &XtreamAuthResponse;

    /// Backend base URL and credentials, used to build stream URLs
    fn credentials(&self) -> &XtreamCredentials;

    async fn live_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError>;

    async fn live_streams(&self, category_id: &str) -> Result<Vec<Value>, XtreamError>;

    async fn vod_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError>;

    async fn vod_streams(&self, category_id: &str) -> Result<Vec<Value>, XtreamError>;

    async fn vod_info(&self, vod_id: &str) -> Result<Value, XtreamError>;

    async fn series_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError>;

    async fn series(&self, category_id: &str) -> Result<Vec<XtreamSeries>, XtreamError>;

    async fn series_info(&self, series_id: &str) -> Result<Value, XtreamError>;

    /// `limit` of 0 leaves the backend default in place
    async fn short_epg(&self, stream_id: &str, limit: i64) -> Result<Value, XtreamError>;

    async fn simple_data_table(&self, stream_id: &str) -> Result<Value, XtreamError>;
}
