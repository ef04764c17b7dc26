//! Prometheus counters exposed on /metrics

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// player_api.php calls by action ("login" for the default response)
    pub static ref API_ACTIONS: IntCounterVec = register_int_counter_vec!(
        "xtream_proxy_api_actions_total",
        "Xtream API actions handled, by action name",
        &["action"]
    )
    .unwrap();

    /// Relay outcomes: streamed, upstream_error, connect_error
    pub static ref RELAY_RESPONSES: IntCounterVec = register_int_counter_vec!(
        "xtream_proxy_relay_responses_total",
        "Stream relay responses, by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Per-category series fetches made while aggregating, by outcome
    pub static ref SERIES_CATEGORY_FETCHES: IntCounterVec = register_int_counter_vec!(
        "xtream_proxy_series_category_fetches_total",
        "Series category fetches during aggregation, by outcome",
        &["outcome"]
    )
    .unwrap();
}
