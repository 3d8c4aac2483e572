//! Inbound and outbound events.
//!
//! Both enums are internally tagged on `type` with kebab-case names, e.g.
//! `{"type": "join-room", "roomId": "AB12CD34", "username": "sam"}`.
//! Unknown fields on inbound events are rejected at decode time.

use crate::media::MediaSource;
use crate::model::{
    ChatMessage, ParticipantInfo, VideoPatch, VideoState, VoiceStats, VoiceStatusPatch,
};
use crate::types::{ConnectionId, RoomCode};
use serde::{Deserialize, Serialize};

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase",
    deny_unknown_fields
)]
pub enum ClientEvent {
    JoinRoom {
        room_id: RoomCode,
        username: String,
    },
    LeaveRoom,
    /// Replace the room's video. Resets playback to 0, paused.
    VideoChange {
        room_id: RoomCode,
        url: String,
    },
    /// Merge a partial playback update into the room's video state.
    VideoSync {
        room_id: RoomCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_time: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_playing: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    RequestSync {
        room_id: RoomCode,
    },
    VoiceStatus {
        room_id: RoomCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_muted: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_voice_enabled: Option<bool>,
    },
    /// Opaque encoded audio chunk, relayed without inspection.
    VoiceData {
        room_id: RoomCode,
        audio_data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    SendMessage {
        room_id: RoomCode,
        message: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

impl ClientEvent {
    /// Stable event name for logs and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::LeaveRoom => "leave-room",
            ClientEvent::VideoChange { .. } => "video-change",
            ClientEvent::VideoSync { .. } => "video-sync",
            ClientEvent::RequestSync { .. } => "request-sync",
            ClientEvent::VoiceStatus { .. } => "voice-status",
            ClientEvent::VoiceData { .. } => "voice-data",
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::Ping { .. } => "ping",
        }
    }

    /// Room the event targets, if it is room-scoped.
    #[must_use]
    pub fn room_id(&self) -> Option<&RoomCode> {
        match self {
            ClientEvent::JoinRoom { room_id, .. }
            | ClientEvent::VideoChange { room_id, .. }
            | ClientEvent::VideoSync { room_id, .. }
            | ClientEvent::RequestSync { room_id }
            | ClientEvent::VoiceStatus { room_id, .. }
            | ClientEvent::VoiceData { room_id, .. }
            | ClientEvent::SendMessage { room_id, .. } => Some(room_id),
            ClientEvent::LeaveRoom | ClientEvent::Ping { .. } => None,
        }
    }

    /// Build a `video-sync` event from a patch.
    #[must_use]
    pub fn video_sync(room_id: RoomCode, patch: VideoPatch) -> Self {
        ClientEvent::VideoSync {
            room_id,
            url: patch.url,
            current_time: patch.current_time,
            is_playing: patch.is_playing,
            duration: patch.duration,
        }
    }
}

/// Split a `video-sync` event's fields into a typed patch.
#[must_use]
pub fn video_patch(
    url: Option<String>,
    current_time: Option<f64>,
    is_playing: Option<bool>,
    duration: Option<f64>,
) -> VideoPatch {
    VideoPatch {
        url,
        current_time,
        is_playing,
        duration,
    }
}

/// Split a `voice-status` event's fields into a typed patch.
#[must_use]
pub const fn voice_status_patch(
    is_muted: Option<bool>,
    is_voice_enabled: Option<bool>,
) -> VoiceStatusPatch {
    VoiceStatusPatch {
        is_muted,
        is_voice_enabled,
    }
}

/// Events sent by the room service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full snapshot for a participant that just joined.
    RoomJoined {
        room_id: RoomCode,
        connection_id: ConnectionId,
        users: Vec<ParticipantInfo>,
        video: VideoState,
        messages: Vec<ChatMessage>,
        is_host: bool,
        voice_stats: VoiceStats,
        /// Server clock when the snapshot was sent, milliseconds since the
        /// Unix epoch. `video.current_time` is valid at this instant.
        timestamp: i64,
    },
    UserJoined {
        username: String,
        connection_id: ConnectionId,
        user_count: usize,
        users: Vec<ParticipantInfo>,
        is_host: bool,
    },
    UserLeft {
        username: String,
        connection_id: ConnectionId,
        user_count: usize,
        users: Vec<ParticipantInfo>,
        was_host: bool,
    },
    /// Room-wide notice that host duty moved.
    HostChanged {
        new_host: String,
        new_host_connection_id: ConnectionId,
    },
    /// Direct notice to the participant that was just promoted.
    BecameHost {
        message: String,
    },
    VideoChanged {
        url: String,
        source: MediaSource,
        channel: Option<String>,
        username: String,
    },
    /// Authoritative playback state. `timestamp` is when the event was sent,
    /// which is when `current_time` is valid.
    VideoSynced {
        url: Option<String>,
        source: Option<MediaSource>,
        current_time: f64,
        is_playing: bool,
        duration: Option<f64>,
        timestamp: i64,
    },
    VoiceStatusUpdate {
        username: String,
        connection_id: ConnectionId,
        is_muted: bool,
        is_voice_enabled: bool,
    },
    VoiceData {
        audio_data: String,
        username: String,
        connection_id: ConnectionId,
        timestamp: i64,
    },
    NewMessage(ChatMessage),
    Error {
        code: String,
        message: String,
    },
    Pong {
        timestamp: i64,
    },
}

impl ServerEvent {
    /// Stable event name for logs and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomJoined { .. } => "room-joined",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::HostChanged { .. } => "host-changed",
            ServerEvent::BecameHost { .. } => "became-host",
            ServerEvent::VideoChanged { .. } => "video-changed",
            ServerEvent::VideoSynced { .. } => "video-synced",
            ServerEvent::VoiceStatusUpdate { .. } => "voice-status-update",
            ServerEvent::VoiceData { .. } => "voice-data",
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Pong { .. } => "pong",
        }
    }

    /// Build a `video-synced` event from the room's current state, stamped
    /// with the time it is sent.
    #[must_use]
    pub fn video_synced(video: &VideoState, sent_at_ms: i64) -> Self {
        ServerEvent::VideoSynced {
            url: video.url.clone(),
            source: video.source.clone(),
            current_time: video.current_time,
            is_playing: video.is_playing,
            duration: video.duration,
            timestamp: sent_at_ms,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_names() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "join-room",
            "roomId": "ab12cd34",
            "username": "sam"
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_id: RoomCode::parse("AB12CD34").unwrap(),
                username: "sam".to_string(),
            }
        );
        assert_eq!(event.name(), "join-room");
    }

    #[test]
    fn test_partial_video_sync_decodes() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "video-sync",
            "roomId": "ROOM0001",
            "isPlaying": true
        }))
        .unwrap();
        let ClientEvent::VideoSync {
            url,
            current_time,
            is_playing,
            duration,
            ..
        } = event
        else {
            unreachable!("decoded as video-sync");
        };
        let patch = video_patch(url, current_time, is_playing, duration);
        assert_eq!(patch.is_playing, Some(true));
        assert!(patch.current_time.is_none());
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "type": "voice-status",
            "roomId": "ROOM0001",
            "isMuted": false,
            "isHost": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unit_and_optional_events() {
        let leave: ClientEvent = serde_json::from_value(json!({"type": "leave-room"})).unwrap();
        assert_eq!(leave, ClientEvent::LeaveRoom);
        assert!(leave.room_id().is_none());

        let ping: ClientEvent = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert_eq!(ping, ClientEvent::Ping { timestamp: None });
    }

    #[test]
    fn test_server_event_shape() {
        let event = ServerEvent::HostChanged {
            new_host: "alex".to_string(),
            new_host_connection_id: ConnectionId::from("conn-2"),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "host-changed",
                "newHost": "alex",
                "newHostConnectionId": "conn-2"
            })
        );

        let message = ServerEvent::NewMessage(ChatMessage {
            id: "m1".to_string(),
            username: "sam".to_string(),
            message: "hi".to_string(),
            timestamp: 5,
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "new-message");
        assert_eq!(value["message"], "hi");
    }

    #[test]
    fn test_video_synced_is_stamped_at_send_time() {
        let mut video = VideoState::empty(1_000);
        video.current_time = 10.0;

        let ServerEvent::VideoSynced {
            current_time,
            is_playing,
            timestamp,
            ..
        } = ServerEvent::video_synced(&video, 301_000)
        else {
            unreachable!("video_synced builds video-synced");
        };
        assert!((current_time - 10.0).abs() < f64::EPSILON);
        assert!(!is_playing);
        assert_eq!(timestamp, 301_000);
    }
}
