//! Message types for actor communication.
//!
//! All inter-actor communication uses `tokio::sync::mpsc`; request-reply uses
//! `tokio::sync::oneshot`.

use crate::actors::room::RoomActorHandle;
use crate::errors::RoomError;
use serde::Serialize;
use std::time::Duration;
use sync_protocol::{
    ConnectionId, ParticipantInfo, RoomCode, ServerEvent, VideoPatch, VideoState, VoiceStats,
    VoiceStatusPatch,
};
use tokio::sync::oneshot;

/// Messages sent to the `RegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Mint a fresh room code and spawn its actor.
    CreateRoom {
        respond_to: oneshot::Sender<Result<RoomCode, RoomError>>,
    },

    /// Look up a live room.
    GetRoom {
        code: RoomCode,
        respond_to: oneshot::Sender<Result<RoomActorHandle, RoomError>>,
    },

    /// Remove a room. Removing an absent room is not an error.
    RemoveRoom {
        code: RoomCode,
        reason: EvictionReason,
        /// `true` if the room was present.
        respond_to: oneshot::Sender<bool>,
    },

    /// Evict empty rooms and rooms older than `max_age`.
    Sweep {
        now_ms: i64,
        max_age: Duration,
        respond_to: oneshot::Sender<SweepReport>,
    },

    /// Handles for every live room, for server-wide stats.
    ListRooms {
        respond_to: oneshot::Sender<Vec<RoomActorHandle>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// Stop accepting new rooms and cancel every room.
    Shutdown {
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
}

/// Messages sent to a `RoomActor`.
///
/// Every request carries the caller's connection id; the room checks
/// membership itself.
#[derive(Debug)]
pub enum RoomMessage {
    Join {
        connection_id: ConnectionId,
        username: String,
        respond_to: oneshot::Sender<Result<JoinAck, RoomError>>,
    },

    Leave {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<LeaveAck>,
    },

    VideoChange {
        connection_id: ConnectionId,
        url: String,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    VideoSync {
        connection_id: ConnectionId,
        patch: VideoPatch,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    RequestSync {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    VoiceStatus {
        connection_id: ConnectionId,
        patch: VoiceStatusPatch,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Fire-and-forget; gated payloads are dropped silently.
    VoiceData {
        connection_id: ConnectionId,
        audio_data: String,
        timestamp: Option<i64>,
    },

    SendMessage {
        connection_id: ConnectionId,
        text: String,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    GetSnapshot {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

/// Messages sent to a `ConnectionActor`.
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Encode and write one event to the socket.
    Send { event: ServerEvent },

    /// Send a close frame and stop.
    Close { reason: String },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Why a room left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Last participant left, or the sweep found it empty.
    Empty,
    /// Older than the maximum room age.
    Expired,
    Shutdown,
}

impl EvictionReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Empty => "empty",
            EvictionReason::Expired => "expired",
            EvictionReason::Shutdown => "shutdown",
        }
    }
}

/// Reply to a successful join.
#[derive(Debug, Clone)]
pub struct JoinAck {
    pub participant: ParticipantInfo,
    pub is_host: bool,
}

/// Reply to a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveAck {
    /// Whether the connection was a member.
    pub was_member: bool,
    /// Whether the room is now empty (and closed to new joins).
    pub room_empty: bool,
}

/// Point-in-time view of one room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomCode,
    pub user_count: usize,
    pub users: Vec<ParticipantInfo>,
    pub video: VideoState,
    pub voice_stats: VoiceStats,
    pub host: Option<ParticipantInfo>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub message_count: usize,
}

/// Registry status, for health and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStatus {
    pub room_count: usize,
    pub connection_count: usize,
    /// Participants across all rooms.
    pub participant_count: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted_empty: usize,
    pub evicted_expired: usize,
    pub remaining: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn evicted(&self) -> usize {
        self.evicted_empty + self.evicted_expired
    }
}
