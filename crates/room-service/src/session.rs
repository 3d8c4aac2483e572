//! Per-connection event dispatch.
//!
//! A `Session` turns one client's decoded events into room operations. It
//! tracks the single room the connection has joined and enforces that
//! room-scoped events name that room. Failures are answered with an `error`
//! event on the same connection; nothing else sees them.

use crate::actors::{EvictionReason, RegistryActorHandle, RoomActorHandle};
use crate::errors::RoomError;
use crate::observability::metrics;
use crate::router::BroadcastRouter;
use crate::state::validate_display_name;
use std::sync::Arc;
use std::time::Instant;
use sync_protocol::events::{video_patch, voice_status_patch};
use sync_protocol::{codec, ClientEvent, ConnectionId, RoomCode, ServerEvent};
use tracing::{debug, error, instrument};

/// Dispatcher for one connection.
pub struct Session {
    connection_id: ConnectionId,
    registry: RegistryActorHandle,
    router: Arc<BroadcastRouter>,
    /// Room joined by this connection, if any.
    current: Option<RoomActorHandle>,
}

impl Session {
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        registry: RegistryActorHandle,
        router: Arc<BroadcastRouter>,
    ) -> Self {
        Self {
            connection_id,
            registry,
            router,
            current: None,
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Decode and handle one text frame.
    pub async fn handle_frame(&mut self, frame: &str) {
        match codec::decode_client_event(frame) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                debug!(
                    target: "rs.session",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Rejected inbound frame"
                );
                self.reply_error("invalid", &RoomError::InvalidFrame(e.to_string()));
            }
        }
    }

    /// Handle one decoded event, replying with an `error` event on failure.
    #[instrument(skip_all, name = "rs.session.event", fields(connection_id = %self.connection_id, event = event.name()))]
    pub async fn handle_event(&mut self, event: ClientEvent) {
        let name = event.name();
        let started = Instant::now();

        if let Err(e) = self.dispatch(event).await {
            self.reply_error(name, &e);
        }

        metrics::record_event_latency(name, started.elapsed());
    }

    /// Leave the current room, if any. Called once when the socket closes.
    pub async fn disconnect(&mut self) {
        self.leave_current().await;
        debug!(
            target: "rs.session",
            connection_id = %self.connection_id,
            "Session ended"
        );
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), RoomError> {
        match event {
            ClientEvent::JoinRoom { room_id, username } => self.join(room_id, &username).await,

            ClientEvent::LeaveRoom => {
                self.leave_current().await;
                Ok(())
            }

            ClientEvent::VideoChange { room_id, url } => {
                let room = self.joined(&room_id)?;
                room.video_change(self.connection_id.clone(), url).await
            }

            ClientEvent::VideoSync {
                room_id,
                url,
                current_time,
                is_playing,
                duration,
            } => {
                let room = self.joined(&room_id)?;
                let patch = video_patch(url, current_time, is_playing, duration);
                room.video_sync(self.connection_id.clone(), patch).await
            }

            ClientEvent::RequestSync { room_id } => {
                let room = self.joined(&room_id)?;
                room.request_sync(self.connection_id.clone()).await
            }

            ClientEvent::VoiceStatus {
                room_id,
                is_muted,
                is_voice_enabled,
            } => {
                let room = self.joined(&room_id)?;
                let patch = voice_status_patch(is_muted, is_voice_enabled);
                room.voice_status(self.connection_id.clone(), patch).await
            }

            ClientEvent::VoiceData {
                room_id,
                audio_data,
                timestamp,
            } => {
                // Voice from outside the room is dropped, not answered
                let Ok(room) = self.joined(&room_id) else {
                    metrics::record_voice_frame("not_member");
                    return Ok(());
                };
                room.voice_data(self.connection_id.clone(), audio_data, timestamp)
            }

            ClientEvent::SendMessage { room_id, message } => {
                let room = self.joined(&room_id)?;
                room.send_message(self.connection_id.clone(), message).await
            }

            ClientEvent::Ping { .. } => {
                self.router.emit_to_connection(
                    &self.connection_id,
                    ServerEvent::Pong {
                        timestamp: chrono::Utc::now().timestamp_millis(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn join(&mut self, room_id: RoomCode, username: &str) -> Result<(), RoomError> {
        let username = validate_display_name(username)?;
        let room = self.registry.get_room(room_id).await?;

        // Joining a second room leaves the first. Re-joining the current
        // room only refreshes the snapshot.
        let same_room = self
            .current
            .as_ref()
            .is_some_and(|current| current.code() == room.code());
        if !same_room {
            self.leave_current().await;
        }

        room.join(self.connection_id.clone(), username).await?;
        self.current = Some(room);
        Ok(())
    }

    /// Run the full leave sequence and drop the room if it is now empty.
    async fn leave_current(&mut self) {
        let Some(room) = self.current.take() else {
            return;
        };

        match room.leave(self.connection_id.clone()).await {
            Ok(ack) if ack.room_empty => {
                if let Err(e) = self
                    .registry
                    .remove_room(room.code().clone(), EvictionReason::Empty)
                    .await
                {
                    debug!(
                        target: "rs.session",
                        room_id = %room.code(),
                        error = %e,
                        "Failed to remove empty room"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                // Room already swept or shut down
                debug!(
                    target: "rs.session",
                    connection_id = %self.connection_id,
                    room_id = %room.code(),
                    error = %e,
                    "Leave on a stopped room"
                );
            }
        }
    }

    /// The current room, if the connection is still bound to `room_id`.
    fn joined(&mut self, room_id: &RoomCode) -> Result<RoomActorHandle, RoomError> {
        let bound = self.router.room_of(&self.connection_id);
        if bound.as_ref() != Some(room_id) {
            if bound.is_none() {
                // Evicted by the sweeper; forget the stale handle
                self.current = None;
            }
            return Err(RoomError::NotAMember(room_id.to_string()));
        }

        self.current
            .as_ref()
            .filter(|room| room.code() == room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotAMember(room_id.to_string()))
    }

    fn reply_error(&self, event: &str, err: &RoomError) {
        metrics::record_event_error(event, err.error_code());
        if matches!(err, RoomError::Internal(_)) {
            error!(
                target: "rs.session",
                connection_id = %self.connection_id,
                event = event,
                error = %err,
                "Event failed"
            );
        } else {
            debug!(
                target: "rs.session",
                connection_id = %self.connection_id,
                event = event,
                error = %err,
                "Event rejected"
            );
        }
        self.router
            .emit_to_connection(&self.connection_id, err.to_event());
    }
}
