mod config;
mod error;
mod routes;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::{
        predicate::{DefaultPredicate, NotForContentType, Predicate},
        CompressionLayer,
    },
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ProxyConfig};
use crate::services::{
    playlist::TrackList,
    relay::StreamRelay,
    xtream::{XtreamBackend, XtreamClient, XtreamCredentials},
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub proxy: Arc<ProxyConfig>,
    /// `None` when no backend URL is configured; API routes then answer 500
    pub backend: Option<Arc<dyn XtreamBackend>>,
    pub relay: StreamRelay,
    pub tracks: TrackList,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xtream_proxy=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting xtream-proxy v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Advertising {}://{}:{}",
        config.protocol(),
        config.hostname,
        config.advertised_port
    );

    // Authenticate against the Xtream backend
    let backend: Option<Arc<dyn XtreamBackend>> = match &config.xtream_base_url {
        Some(base_url) => {
            let creds =
                XtreamCredentials::new(base_url, &config.xtream_user, &config.xtream_password);
            let client = XtreamClient::connect(
                creds,
                &config.xtream_user_agent,
                Duration::from_secs(config.xtream_timeout_secs),
            )
            .await?;
            let backend: Arc<dyn XtreamBackend> = Arc::new(client);
            Some(backend)
        }
        None => {
            tracing::warn!("XTREAM_BASE_URL not set; Xtream API routes are disabled");
            None
        }
    };

    // Source playlist for /track routes
    let tracks = match &config.m3u_source_path {
        Some(path) => TrackList::load(path).await.map_err(|e| {
            anyhow::anyhow!("failed to load source playlist {}: {}", path, e)
        })?,
        None => TrackList::default(),
    };
    if config.m3u_source_path.is_some() && tracks.is_empty() {
        tracing::warn!("Source playlist has no tracks; /track routes will answer 404");
    }

    let relay = StreamRelay::new()?;

    // Build application state
    let state = Arc::new(AppState {
        proxy: Arc::new(config.proxy()),
        config,
        backend,
        relay,
        tracks,
        start_time: Instant::now(),
    });

    // Build router
    let app = routes::router(state)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            // Relayed media passes through byte for byte
            CompressionLayer::new().compress_when(
                DefaultPredicate::new()
                    .and(NotForContentType::const_new("video/"))
                    .and(NotForContentType::const_new("audio/"))
                    .and(NotForContentType::const_new("application/octet-stream")),
            ),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
