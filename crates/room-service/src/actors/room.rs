//! `RoomActor` - per-room actor that owns one [`Room`].
//!
//! Each `RoomActor`:
//! - Serializes every request for its room, so each mutation and the
//!   broadcasts it causes complete before the next request is looked at
//! - Binds and unbinds members in the [`BroadcastRouter`]
//! - Publishes its occupancy for the registry's sweep
//!
//! # Closing
//!
//! When the last participant leaves, the actor marks itself closed and
//! rejects later joins with `RoomNotFound`; the caller then removes it from
//! the registry. Cancellation (expiry or shutdown) unbinds any remaining
//! members without notifying them.

use crate::config::RoomLimits;
use crate::errors::RoomError;
use crate::observability::metrics;
use crate::router::BroadcastRouter;
use crate::state::{LeaveOutcome, Room};

use super::messages::{JoinAck, LeaveAck, RoomMessage, RoomSnapshot};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sync_protocol::{ConnectionId, RoomCode, ServerEvent, VideoPatch, VoiceStatusPatch};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

const BECAME_HOST_MESSAGE: &str = "You are now the host - voice activated";

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    code: RoomCode,
}

impl RoomActorHandle {
    #[must_use]
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Join the room. The joiner receives `room-joined`, everyone else
    /// `user-joined`, before this returns.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        username: String,
    ) -> Result<JoinAck, RoomError> {
        self.request(|respond_to| RoomMessage::Join {
            connection_id,
            username,
            respond_to,
        })
        .await?
    }

    /// Leave the room. Leaving a room the connection is not in is a no-op.
    pub async fn leave(&self, connection_id: ConnectionId) -> Result<LeaveAck, RoomError> {
        self.request(|respond_to| RoomMessage::Leave {
            connection_id,
            respond_to,
        })
        .await
    }

    pub async fn video_change(
        &self,
        connection_id: ConnectionId,
        url: String,
    ) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::VideoChange {
            connection_id,
            url,
            respond_to,
        })
        .await?
    }

    pub async fn video_sync(
        &self,
        connection_id: ConnectionId,
        patch: VideoPatch,
    ) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::VideoSync {
            connection_id,
            patch,
            respond_to,
        })
        .await?
    }

    pub async fn request_sync(&self, connection_id: ConnectionId) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::RequestSync {
            connection_id,
            respond_to,
        })
        .await?
    }

    pub async fn voice_status(
        &self,
        connection_id: ConnectionId,
        patch: VoiceStatusPatch,
    ) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::VoiceStatus {
            connection_id,
            patch,
            respond_to,
        })
        .await?
    }

    /// Relay a voice payload. Never waits: a backed-up room drops the frame.
    pub fn voice_data(
        &self,
        connection_id: ConnectionId,
        audio_data: String,
        timestamp: Option<i64>,
    ) -> Result<(), RoomError> {
        match self.sender.try_send(RoomMessage::VoiceData {
            connection_id,
            audio_data,
            timestamp,
        }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_message_dropped(ActorType::Room.as_str());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.stopped()),
        }
    }

    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        text: String,
    ) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::SendMessage {
            connection_id,
            text,
            respond_to,
        })
        .await?
    }

    pub async fn get_snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|respond_to| RoomMessage::GetSnapshot { respond_to })
            .await
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// A closed mailbox or a dropped reply means the actor has stopped, so
    /// the room no longer exists for the caller.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(build(tx)).await.map_err(|_| self.stopped())?;

        rx.await.map_err(|_| self.stopped())
    }

    fn stopped(&self) -> RoomError {
        debug!(
            target: "rs.actor.room",
            room_id = %self.code,
            "Request to a stopped room"
        );
        RoomError::RoomNotFound(self.code.to_string())
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room: Room,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    router: Arc<BroadcastRouter>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
    /// Member count published for the registry's sweep.
    occupancy: Arc<AtomicUsize>,
    /// Set once the last member leaves.
    closed: bool,
}

impl RoomActor {
    /// Spawn a room actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        code: RoomCode,
        created_at: i64,
        limits: RoomLimits,
        router: Arc<BroadcastRouter>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        occupancy: Arc<AtomicUsize>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            room: Room::new(code.clone(), created_at, limits),
            receiver,
            cancel_token: cancel_token.clone(),
            router,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, code.as_str()),
            occupancy,
            closed: false,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            code,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "rs.actor.room", fields(room_id = %self.room.code()))]
    async fn run(mut self) {
        debug!(
            target: "rs.actor.room",
            room_id = %self.room.code(),
            "RoomActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    self.release_members();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            debug!(
                                target: "rs.actor.room",
                                room_id = %self.room.code(),
                                "RoomActor channel closed, exiting"
                            );
                            self.release_members();
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rs.actor.room",
            room_id = %self.room.code(),
            participants = self.room.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                connection_id,
                username,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_join(connection_id, &username));
            }

            RoomMessage::Leave {
                connection_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_leave(&connection_id));
            }

            RoomMessage::VideoChange {
                connection_id,
                url,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_video_change(&connection_id, &url));
            }

            RoomMessage::VideoSync {
                connection_id,
                patch,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_video_sync(&connection_id, &patch));
            }

            RoomMessage::RequestSync {
                connection_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_request_sync(&connection_id));
            }

            RoomMessage::VoiceStatus {
                connection_id,
                patch,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_voice_status(&connection_id, &patch));
            }

            RoomMessage::VoiceData {
                connection_id,
                audio_data,
                timestamp,
            } => {
                self.handle_voice_data(&connection_id, audio_data, timestamp);
            }

            RoomMessage::SendMessage {
                connection_id,
                text,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_send_message(&connection_id, &text));
            }

            RoomMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        username: &str,
    ) -> Result<JoinAck, RoomError> {
        if self.closed {
            return Err(RoomError::RoomNotFound(self.room.code().to_string()));
        }

        let outcome = self.room.join(connection_id.clone(), username, now_ms())?;
        let code = self.room.code().clone();
        if !outcome.rejoined {
            self.publish_occupancy();
            self.metrics.participant_joined();
            self.router.bind(&connection_id, &code);
        }

        let users = self.room.participants();
        let snapshot = ServerEvent::RoomJoined {
            room_id: code.clone(),
            connection_id: connection_id.clone(),
            users: users.clone(),
            video: self.room.video().clone(),
            messages: self
                .room
                .recent_messages(self.room.limits().snapshot_message_count),
            is_host: outcome.is_host,
            voice_stats: self.room.voice_stats(),
            timestamp: now_ms(),
        };
        self.router.emit_to_connection(&connection_id, snapshot);

        if outcome.rejoined {
            debug!(
                target: "rs.actor.room",
                room_id = %code,
                connection_id = %connection_id,
                "Snapshot re-sent to existing participant"
            );
            return Ok(JoinAck {
                participant: outcome.participant,
                is_host: outcome.is_host,
            });
        }

        let delta = ServerEvent::UserJoined {
            username: outcome.participant.username.clone(),
            connection_id: connection_id.clone(),
            user_count: users.len(),
            users,
            is_host: outcome.is_host,
        };
        self.router.emit_to_room(&code, &delta, Some(&connection_id));

        info!(
            target: "rs.actor.room",
            room_id = %code,
            connection_id = %connection_id,
            is_host = outcome.is_host,
            participants = self.room.len(),
            "Participant joined"
        );

        Ok(JoinAck {
            participant: outcome.participant,
            is_host: outcome.is_host,
        })
    }

    fn handle_leave(&mut self, connection_id: &ConnectionId) -> LeaveAck {
        let Some(outcome) = self.room.leave(connection_id) else {
            return LeaveAck {
                was_member: false,
                room_empty: self.room.is_empty(),
            };
        };

        let code = self.room.code().clone();
        self.router.unbind(connection_id, &code);
        self.publish_occupancy();
        self.metrics.participant_left();

        self.announce_departure(&code, &outcome);

        if outcome.room_empty {
            self.closed = true;
        }

        info!(
            target: "rs.actor.room",
            room_id = %code,
            connection_id = %connection_id,
            was_host = outcome.was_host,
            participants = self.room.len(),
            "Participant left"
        );

        LeaveAck {
            was_member: true,
            room_empty: outcome.room_empty,
        }
    }

    /// `user-left` to the remaining members, then on host departure
    /// `host-changed` room-wide and `became-host` to the successor.
    fn announce_departure(&self, code: &RoomCode, outcome: &LeaveOutcome) {
        if outcome.room_empty {
            return;
        }

        let users = self.room.participants();
        let left = ServerEvent::UserLeft {
            username: outcome.departed.username.clone(),
            connection_id: outcome.departed.connection_id.clone(),
            user_count: users.len(),
            users,
            was_host: outcome.was_host,
        };
        self.router.emit_to_room(code, &left, None);

        let Some(promotion) = &outcome.promotion else {
            return;
        };

        metrics::record_host_migration();
        self.router.emit_to_room(
            code,
            &ServerEvent::HostChanged {
                new_host: promotion.username.clone(),
                new_host_connection_id: promotion.connection_id.clone(),
            },
            None,
        );
        self.router.emit_to_connection(
            &promotion.connection_id,
            ServerEvent::BecameHost {
                message: BECAME_HOST_MESSAGE.to_string(),
            },
        );

        info!(
            target: "rs.actor.room",
            room_id = %code,
            new_host_connection_id = %promotion.connection_id,
            "Host migrated"
        );
    }

    fn handle_video_change(
        &mut self,
        connection_id: &ConnectionId,
        url: &str,
    ) -> Result<(), RoomError> {
        let username = self.member_name(connection_id)?;
        let video = self.room.change_video(url, now_ms())?.clone();

        let (Some(url), Some(source)) = (video.url, video.source) else {
            return Err(RoomError::Internal(
                "video change left no source".to_string(),
            ));
        };

        debug!(
            target: "rs.actor.room",
            room_id = %self.room.code(),
            platform = source.platform(),
            "Video changed"
        );

        let event = ServerEvent::VideoChanged {
            url,
            channel: video.channel,
            source,
            username,
        };
        self.router.emit_to_room(self.room.code(), &event, None);
        Ok(())
    }

    fn handle_video_sync(
        &mut self,
        connection_id: &ConnectionId,
        patch: &VideoPatch,
    ) -> Result<(), RoomError> {
        self.require_member(connection_id)?;
        let now = now_ms();
        let event = ServerEvent::video_synced(self.room.update_video(patch, now)?, now);
        self.router
            .emit_to_room(self.room.code(), &event, Some(connection_id));
        Ok(())
    }

    /// Authoritative state, to the requester only.
    fn handle_request_sync(&self, connection_id: &ConnectionId) -> Result<(), RoomError> {
        self.require_member(connection_id)?;
        let event = ServerEvent::video_synced(self.room.video(), now_ms());
        self.router.emit_to_connection(connection_id, event);
        Ok(())
    }

    fn handle_voice_status(
        &mut self,
        connection_id: &ConnectionId,
        patch: &VoiceStatusPatch,
    ) -> Result<(), RoomError> {
        let participant = self.room.update_voice_status(connection_id, patch)?;
        let event = ServerEvent::VoiceStatusUpdate {
            username: participant.username,
            connection_id: participant.connection_id,
            is_muted: participant.voice_status.is_muted,
            is_voice_enabled: participant.voice_status.is_voice_enabled,
        };
        self.router
            .emit_to_room(self.room.code(), &event, Some(connection_id));
        Ok(())
    }

    fn handle_voice_data(
        &self,
        connection_id: &ConnectionId,
        audio_data: String,
        timestamp: Option<i64>,
    ) {
        let decision = self.room.gate_voice(connection_id, audio_data.len());
        metrics::record_voice_frame(decision.as_str());
        if !decision.is_relay() {
            return;
        }
        let Some(sender) = self.room.participant(connection_id) else {
            return;
        };

        let event = ServerEvent::VoiceData {
            audio_data,
            username: sender.username,
            connection_id: sender.connection_id,
            timestamp: timestamp.unwrap_or_else(now_ms),
        };
        self.router
            .emit_to_room(self.room.code(), &event, Some(connection_id));
    }

    fn handle_send_message(
        &mut self,
        connection_id: &ConnectionId,
        text: &str,
    ) -> Result<(), RoomError> {
        let message = self.room.add_message(connection_id, text, now_ms())?;
        self.router
            .emit_to_room(self.room.code(), &ServerEvent::NewMessage(message), None);
        Ok(())
    }

    fn snapshot(&self) -> RoomSnapshot {
        let users = self.room.participants();
        RoomSnapshot {
            room_id: self.room.code().clone(),
            user_count: users.len(),
            users,
            video: self.room.video().clone(),
            voice_stats: self.room.voice_stats(),
            host: self.room.host(),
            created_at: self.room.created_at(),
            message_count: self.room.messages().len(),
        }
    }

    fn require_member(&self, connection_id: &ConnectionId) -> Result<(), RoomError> {
        if self.room.is_member(connection_id) {
            Ok(())
        } else {
            Err(RoomError::NotAMember(self.room.code().to_string()))
        }
    }

    fn member_name(&self, connection_id: &ConnectionId) -> Result<String, RoomError> {
        self.room
            .participant(connection_id)
            .map(|p| p.username)
            .ok_or_else(|| RoomError::NotAMember(self.room.code().to_string()))
    }

    fn publish_occupancy(&self) {
        self.occupancy.store(self.room.len(), Ordering::Relaxed);
    }

    /// Unbind whoever is still here. Used on expiry and shutdown.
    fn release_members(&mut self) {
        let released = self.router.unbind_room(self.room.code());
        for _ in &released {
            self.metrics.participant_left();
        }
        if !released.is_empty() {
            warn!(
                target: "rs.actor.room",
                room_id = %self.room.code(),
                released = released.len(),
                "Room closed with participants still present"
            );
        }
        self.closed = true;
        self.occupancy.store(0, Ordering::Relaxed);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
