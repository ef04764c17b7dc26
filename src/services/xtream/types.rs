//! Xtream Codes API Types
//!
//! Type definitions for the subset of Player API v2 payloads the proxy needs to
//! inspect. Everything else is forwarded as raw JSON.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Backend credentials, never exposed to proxy clients
#[derive(Debug, Clone)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

impl XtreamCredentials {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Build the player_api.php base URL
    pub fn api_url(&self) -> String {
        format!("{}/player_api.php", self.server)
    }

    /// Build a playback URL for `/{kind}/{user}/{pass}/{rest}`
    ///
    /// `kind` is one of `live`, `movie`, `series` or `timeshift`; `rest` is the
    /// client-supplied remainder of the path (stream id, or duration/start/id).
    pub fn stream_url(&self, kind: &str, rest: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.server, kind, self.username, self.password, rest
        )
    }

    /// Build EPG XML URL
    pub fn epg_url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.username)
            .append_pair("password", &self.password)
            .finish();
        format!("{}/xmltv.php?{}", self.server, query)
    }
}

// ============================================================================
// Tolerant scalar decoding
// ============================================================================

/// A scalar whose JSON type varies between backends
///
/// Xtream servers send the same field as `5`, `"5"`, `5.0` or `null` depending
/// on the vendor. The variant records what actually arrived; [`FlexValue::to_i64`]
/// applies the conversion rules.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FlexValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arrays/objects where a scalar was expected, kept verbatim
    Other(Value),
}

impl FlexValue {
    /// Integer view of the value
    ///
    /// Numbers are truncated, non-empty decimal strings are parsed, everything
    /// else (null, booleans, empty or non-numeric strings, containers) has no
    /// integer value.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            FlexValue::Int(v) => Some(*v),
            FlexValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            FlexValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Integer field decoded from a [`FlexValue`]; unconvertible input becomes 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlexInt(pub i64);

impl<'de> Deserialize<'de> for FlexInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = FlexValue::deserialize(deserializer)?;
        Ok(FlexInt(raw.to_i64().unwrap_or(0)))
    }
}

impl Serialize for FlexInt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl fmt::Display for FlexInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `null` decodes to the type's default, like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional tolerant integer: absent, null or unconvertible input is `None`
fn deserialize_flex_opt<'de, D>(deserializer: D) -> Result<Option<FlexInt>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = FlexValue::deserialize(deserializer)?;
    Ok(raw.to_i64().map(FlexInt))
}

// ============================================================================
// Authentication Response Types
// ============================================================================

/// Main authentication response from player_api.php (no action)
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct XtreamAuthResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_info: XtreamUserInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_info: XtreamServerInfo,
}

/// User account information
///
/// Account counters and dates are kept in their original JSON shape so the
/// login response reproduces them exactly.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct XtreamUserInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub password: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    pub auth: FlexInt,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    pub exp_date: FlexValue,
    pub is_trial: FlexValue,
    pub active_cons: FlexValue,
    pub created_at: FlexValue,
    pub max_connections: FlexValue,
    #[serde(deserialize_with = "null_as_default")]
    pub allowed_output_formats: Vec<String>,
}

impl XtreamUserInfo {
    /// Check if account is active
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Server information
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct XtreamServerInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    pub port: FlexValue,
    pub https_port: FlexValue,
    #[serde(deserialize_with = "null_as_default")]
    pub server_protocol: String,
    pub rtmp_port: FlexValue,
    #[serde(deserialize_with = "null_as_default")]
    pub timezone: String,
    pub timestamp_now: FlexValue,
    #[serde(deserialize_with = "null_as_default")]
    pub time_now: String,
}

// ============================================================================
// Catalog Types
// ============================================================================

/// Category for live, VOD, or series
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct XtreamCategory {
    #[serde(default)]
    pub category_id: FlexInt,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_name: String,
    #[serde(default)]
    pub parent_id: FlexInt,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Series listing entry from get_series
///
/// Only the identifying fields are decoded; the rest of the record is carried
/// through untouched.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct XtreamSeries {
    #[serde(default)]
    pub series_id: FlexInt,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "deserialize_flex_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<FlexInt>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl XtreamSeries {
    /// Whether this record belongs to the category named by a client filter
    pub fn in_category(&self, category_id: &str) -> bool {
        match (self.category_id, category_id.trim().parse::<i64>()) {
            (Some(own), Ok(wanted)) => own.0 == wanted,
            _ => false,
        }
    }
}
