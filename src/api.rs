//! HTTP API endpoints.
//!
//! Game lookup and creation for clients that are not on a socket yet, plus
//! state export/import for operators.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::SyncError;
use crate::protocol::{CreateGameRequest, CreateGameResponse};
use crate::state::export::StateSnapshot;
use crate::state::AppState;
use crate::types::Game;

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Malformed(_) => StatusCode::BAD_REQUEST,
            SyncError::Forbidden(_) => StatusCode::FORBIDDEN,
            SyncError::Ambiguous(_) => StatusCode::CONFLICT,
        };
        let body = Json(json!({ "code": self.code(), "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Fetch one game.
///
/// GET /game/{id}
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Game>, SyncError> {
    state
        .world()
        .await
        .repo
        .games()
        .get(&id)
        .map(Json)
        .ok_or_else(|| SyncError::not_found(format!("game {}", id)))
}

/// Create a game with the given player as moderator.
///
/// POST /game
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateGameRequest>, JsonRejection>,
) -> Result<Json<CreateGameResponse>, SyncError> {
    let Json(req) = body.map_err(|e| SyncError::Malformed(e.body_text()))?;
    if req.uuid.trim().is_empty() {
        return Err(SyncError::Malformed("uuid is required".to_string()));
    }

    let game = state.world().await.create_game_detached(req.name, &req.uuid);
    Ok(Json(CreateGameResponse { id: game.id }))
}

/// Export the entire state as JSON.
///
/// GET /api/state/export
pub async fn export_state(State(state): State<Arc<AppState>>) -> Json<StateSnapshot> {
    Json(state.export_state().await)
}

/// Import a state snapshot.
///
/// POST /api/state/import
///
/// Replaces all current state with the imported data and pushes fresh views
/// to every authenticated connection.
pub async fn import_state(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StateSnapshot>, JsonRejection>,
) -> Response {
    let snapshot = match body {
        Ok(Json(snapshot)) => snapshot,
        Err(e) => return SyncError::Malformed(e.body_text()).into_response(),
    };
    match state.import_state(snapshot).await {
        Ok(()) => (StatusCode::OK, "State imported successfully").into_response(),
        Err(e) => {
            tracing::error!("State import failed: {}", e);
            (StatusCode::BAD_REQUEST, format!("Import failed: {}", e)).into_response()
        }
    }
}
