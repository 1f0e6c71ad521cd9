// Public API for integration tests and the server binary

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod origin;
pub mod protocol;
pub mod registry;
pub mod repository;
pub mod state;
pub mod types;
pub mod ws;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use config::Config;
use origin::OriginPolicy;
use state::AppState;

/// Build the full HTTP router: socket endpoint, game API, state export and
/// the static client as fallback.
pub fn router(state: Arc<AppState>, config: &Config) -> Router {
    let policy = Arc::new(OriginPolicy::new(config.allowed_origins.clone()));

    // WebSocket route with origin check
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            policy.clone(),
            origin::ws_origin_middleware,
        ));

    let api_routes = Router::new()
        .route("/game", post(api::create_game))
        .route("/game/{id}", get(api::get_game))
        .route("/api/state/export", get(api::export_state))
        .route("/api/state/import", post(api::import_state));

    Router::new()
        .merge(ws_routes)
        .merge(api_routes)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(policy.cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
