//! In-memory backend used by the dispatcher, aggregator and router tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::backend::XtreamBackend;
use super::client::XtreamError;
use super::types::*;

/// Scripted backend that records every call it receives
#[derive(Default)]
pub struct MockBackend {
    pub account: XtreamAuthResponse,
    pub creds: XtreamCredentials,
    /// `None` makes `series_categories` fail
    pub series_categories: Option<Vec<XtreamCategory>>,
    /// Series per category id; the "" key is the unfiltered listing
    pub series: HashMap<String, Vec<XtreamSeries>>,
    pub failing_series: HashSet<String>,
    pub delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for XtreamCredentials {
    fn default() -> Self {
        XtreamCredentials::new("http://backend.test:8080", "realuser", "realpass")
    }
}

pub fn category(id: i64, name: &str) -> XtreamCategory {
    XtreamCategory {
        category_id: FlexInt(id),
        category_name: name.to_string(),
        ..Default::default()
    }
}

pub fn series(id: i64, name: &str, category_id: i64) -> XtreamSeries {
    XtreamSeries {
        series_id: FlexInt(id),
        name: name.to_string(),
        category_id: Some(FlexInt(category_id)),
        ..Default::default()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let mut backend = Self::default();
        backend.account = serde_json::from_value(json!({
            "user_info": {
                "username": "realuser",
                "password": "realpass",
                "message": "Welcome",
                "auth": 1,
                "status": "Active",
                "exp_date": "1893456000",
                "is_trial": "0",
                "active_cons": "0",
                "created_at": "1600000000",
                "max_connections": "2",
                "allowed_output_formats": ["m3u8", "ts"]
            },
            "server_info": {
                "url": "backend.test",
                "port": "8080",
                "https_port": "8443",
                "server_protocol": "http",
                "rtmp_port": "1935",
                "timezone": "Europe/Paris",
                "timestamp_now": 1700000000,
                "time_now": "2023-11-14 22:13:20"
            }
        }))
        .unwrap_or_default();
        backend
    }

    /// Categories 1..=n, each holding one series whose id equals the category id
    pub fn with_series_categories(n: i64) -> Self {
        let mut backend = Self::new();
        backend.series_categories = Some((1..=n).map(|i| category(i, &format!("Cat {}", i))).collect());
        for i in 1..=n {
            backend
                .series
                .insert(i.to_string(), vec![series(i, &format!("Show {}", i), i)]);
        }
        backend
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl XtreamBackend for MockBackend {
    fn account(&self) -> &XtreamAuthResponse {
        &self.account
    }

    fn credentials(&self) -> &XtreamCredentials {
        &self.creds
    }

    async fn live_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.record("get_live_categories".into());
        Ok(vec![category(1, "News")])
    }

    async fn live_streams(&self, category_id: &str) -> Result<Vec<Value>, XtreamError> {
        self.record(format!("get_live_streams:{}", category_id));
        Ok(vec![json!({"stream_id": 100, "name": "Live", "category_id": category_id})])
    }

    async fn vod_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.record("get_vod_categories".into());
        Ok(vec![category(2, "Movies")])
    }

    async fn vod_streams(&self, category_id: &str) -> Result<Vec<Value>, XtreamError> {
        self.record(format!("get_vod_streams:{}", category_id));
        Ok(vec![json!({"stream_id": 200, "name": "Movie"})])
    }

    async fn vod_info(&self, vod_id: &str) -> Result<Value, XtreamError> {
        self.record(format!("get_vod_info:{}", vod_id));
        Ok(json!({"info": {"name": "Movie"}, "movie_data": {"stream_id": vod_id}}))
    }

    async fn series_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.record("get_series_categories".into());
        self.series_categories
            .clone()
            .ok_or(XtreamError::Http(503))
    }

    async fn series(&self, category_id: &str) -> Result<Vec<XtreamSeries>, XtreamError> {
        self.record(format!("get_series:{}", category_id));
        self.simulate_latency().await;
        if self.failing_series.contains(category_id) {
            return Err(XtreamError::Network(format!("category {} unreachable", category_id)));
        }
        Ok(self.series.get(category_id).cloned().unwrap_or_default())
    }

    async fn series_info(&self, series_id: &str) -> Result<Value, XtreamError> {
        self.record(format!("get_series_info:{}", series_id));
        Ok(json!({"info": {"name": "Show"}, "episodes": {}}))
    }

    async fn short_epg(&self, stream_id: &str, limit: i64) -> Result<Value, XtreamError> {
        self.record(format!("get_short_epg:{}:{}", stream_id, limit));
        Ok(json!({"epg_listings": []}))
    }

    async fn simple_data_table(&self, stream_id: &str) -> Result<Value, XtreamError> {
        self.record(format!("get_simple_data_table:{}", stream_id));
        Ok(json!({"epg_listings": [{"id": "1"}]}))
    }
}
