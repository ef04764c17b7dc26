//! Xtream Codes Integration
//!
//! This module talks to the real ("upstream") Xtream Codes Player API v2 on
//! behalf of proxy clients.
//!
//! # Overview
//!
//! - **Backend**: the [`XtreamBackend`] capability trait, the only thing the
//!   dispatcher and aggregator depend on
//! - **API Client**: [`XtreamClient`], the HTTP implementation holding the
//!   backend session and account metadata
//! - **Types**: tolerant decoding of the fields the proxy inspects
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::services::xtream::{XtreamBackend, XtreamClient, XtreamCredentials};
//!
//! let creds = XtreamCredentials::new("http://backend:8080", "real_user", "real_pass");
//! let client = XtreamClient::connect(creds, "VLC/3.0.20", Duration::from_secs(30)).await?;
//! let categories = client.series_categories().await?;
//! ```

pub mod backend;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

// Re-exports for convenience
pub use backend::XtreamBackend;
pub use client::{XtreamClient, XtreamError};
pub use types::{
    FlexInt, FlexValue, XtreamAuthResponse, XtreamCategory, XtreamCredentials, XtreamSeries,
    XtreamServerInfo, XtreamUserInfo,
};
