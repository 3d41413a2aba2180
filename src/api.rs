//! HTTP API endpoints.
//!
//! Read-only helpers for entry pages and monitoring; all game traffic goes over the socket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::{RoomCode, RoomPhase};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub rooms: usize,
    pub connections: usize,
    pub white_cards: usize,
    pub black_cards: usize,
}

/// Public facts about a room, enough to decide whether to join it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: RoomCode,
    pub state: RoomPhase,
    pub round: u32,
    pub player_count: usize,
    pub win_target: Option<u32>,
    pub is_endless: bool,
    pub is_democratic: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/rooms/{code}", get(room_summary))
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (white_cards, black_cards) = state.cards.counts().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        rooms: state.rooms.len().await,
        connections: state.hub.connection_count().await,
        white_cards,
        black_cards,
    })
}

/// GET /api/rooms/{code}
///
/// 404 if no such room is live.
pub async fn room_summary(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Response {
    if state.rooms.get(&code).await.is_err() {
        return (StatusCode::NOT_FOUND, "Game not found.").into_response();
    }

    let summary = state
        .serialized(&code, |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let room = shared.lock().await;
            Ok(RoomSummary {
                code: room.code.clone(),
                state: room.phase,
                round: room.round,
                player_count: room.players.iter().filter(|p| !p.is_spectator()).count(),
                win_target: room.settings.win_target,
                is_endless: room.settings.is_endless,
                is_democratic: room.settings.is_democratic,
                created_at: room.created_at,
            })
        })
        .await;

    match summary {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            tracing::debug!("Room summary for {} unavailable: {}", code, e);
            (StatusCode::NOT_FOUND, "Game not found.").into_response()
        }
    }
}
