//! Room HTTP API.
//!
//! - `POST /api/create-room` - mint a room, returns `{"roomId": "..."}`
//! - `GET /api/room/:room_id` - room snapshot, 404 when absent
//! - `GET /api/stats` - server-wide totals

use crate::actors::RoomSnapshot;
use crate::errors::RoomError;
use crate::routes::AppState;
use crate::stats::{self, ServerStats};
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use sync_protocol::RoomCode;
use tracing::{info, instrument};

/// Response for `POST /api/create-room`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: RoomCode,
}

#[instrument(skip_all, name = "rs.http.create_room")]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CreateRoomResponse>, RoomError> {
    let room_id = state.registry.create_room().await?;
    info!(target: "rs.http", room_id = %room_id, "Room created via API");
    Ok(Json(CreateRoomResponse { room_id }))
}

/// A malformed code is reported the same as an unknown one.
#[instrument(skip_all, name = "rs.http.get_room")]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, RoomError> {
    let code = RoomCode::parse(&room_id).map_err(|_| RoomError::RoomNotFound(room_id.clone()))?;
    let room = state.registry.get_room(code).await?;
    let snapshot = room
        .get_snapshot()
        .await
        .map_err(|_| RoomError::RoomNotFound(room_id))?;
    Ok(Json(snapshot))
}

#[instrument(skip_all, name = "rs.http.stats")]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<ServerStats>, RoomError> {
    Ok(Json(stats::collect(&state.registry).await?))
}
