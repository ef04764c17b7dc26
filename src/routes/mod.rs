pub mod api;
pub mod auth;
pub mod health;
pub mod playlist;
pub mod stream;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;

/// Build the proxy router
///
/// `/player_api.php` accepts query credentials on GET and body credentials on
/// POST. The playlist and XMLTV routes take query credentials, or form
/// credentials on POST. Stream routes check the credentials embedded in their
/// path.
pub fn router(state: Arc<AppState>) -> Router {
    let query_auth = || middleware::from_fn_with_state(state.clone(), auth::authenticate);
    let body_auth = middleware::from_fn_with_state(state.clone(), auth::app_authenticate);

    let playlist_path = format!("/{}", state.config.m3u_file_name);

    Router::new()
        // Health endpoints
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/ready", get(health::ready))
        .route("/live", get(health::live))
        // Xtream API
        .route(
            "/player_api.php",
            get(api::player_api_get)
                .route_layer(query_auth())
                .merge(post(api::player_api_post).route_layer(body_auth)),
        )
        .route(
            "/xmltv.php",
            get(stream::xmltv)
                .post(stream::xmltv)
                .route_layer(query_auth()),
        )
        .route(
            &playlist_path,
            get(playlist::get_m3u)
                .post(playlist::get_m3u)
                .route_layer(query_auth()),
        )
        // Media passthrough
        .route("/live/:username/:password/:id", get(stream::live))
        .route("/movie/:username/:password/:id", get(stream::movie))
        .route("/series/:username/:password/:id", get(stream::series))
        .route(
            "/timeshift/:username/:password/:duration/:start/:id",
            get(stream::timeshift),
        )
        .route(
            "/track/:username/:password/:index/:id",
            get(stream::track),
        )
        .with_state(state)
}
