//! Server-wide totals across every live room.

use crate::actors::{RegistryActorHandle, RoomSnapshot};
use crate::errors::RoomError;
use serde::Serialize;

/// Voice totals across all rooms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTotals {
    pub users_with_voice: usize,
    pub unmuted_users: usize,
}

/// Totals reported by `GET /api/stats` and logged after each sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub active_rooms: usize,
    pub total_users: usize,
    pub total_hosts: usize,
    pub rooms_with_video: usize,
    pub voice_stats: VoiceTotals,
}

impl ServerStats {
    /// Fold one room into the totals.
    pub fn add_room(&mut self, room: &RoomSnapshot) {
        self.active_rooms += 1;
        self.total_users += room.user_count;
        self.total_hosts += usize::from(room.host.is_some());
        self.rooms_with_video += usize::from(room.video.url.is_some());
        self.voice_stats.users_with_voice += room.voice_stats.users_with_voice;
        self.voice_stats.unmuted_users += room.voice_stats.unmuted_users;
    }
}

/// Snapshot every live room and total them up.
///
/// A room that stops between listing and snapshotting is skipped.
pub async fn collect(registry: &RegistryActorHandle) -> Result<ServerStats, RoomError> {
    let mut stats = ServerStats::default();
    for room in registry.list_rooms().await? {
        if let Ok(snapshot) = room.get_snapshot().await {
            stats.add_room(&snapshot);
        }
    }
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sync_protocol::{
        ConnectionId, ParticipantInfo, RoomCode, VideoState, VoiceStats, VoiceStatus,
    };

    fn snapshot(users: usize, with_video: bool, voice: VoiceStats) -> RoomSnapshot {
        let host = (users > 0).then(|| ParticipantInfo {
            connection_id: ConnectionId::from("host"),
            username: "host".to_string(),
            is_host: true,
            joined_at: 0,
            voice_status: VoiceStatus::on_join(true),
        });
        let mut video = VideoState::empty(0);
        if with_video {
            video.url = Some("https://youtu.be/dQw4w9WgXcQ".to_string());
        }
        RoomSnapshot {
            room_id: RoomCode::parse("STATS001").unwrap(),
            user_count: users,
            users: Vec::new(),
            video,
            voice_stats: voice,
            host,
            created_at: 0,
            message_count: 0,
        }
    }

    #[test]
    fn test_totals_across_rooms() {
        let mut stats = ServerStats::default();
        stats.add_room(&snapshot(
            3,
            true,
            VoiceStats {
                total_users: 3,
                users_with_voice: 2,
                unmuted_users: 1,
            },
        ));
        stats.add_room(&snapshot(0, false, VoiceStats::default()));

        assert_eq!(stats.active_rooms, 2);
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_hosts, 1);
        assert_eq!(stats.rooms_with_video, 1);
        assert_eq!(stats.voice_stats.users_with_voice, 2);
        assert_eq!(stats.voice_stats.unmuted_users, 1);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(ServerStats::default()).unwrap();
        assert!(json.get("activeRooms").is_some());
        assert!(json.get("roomsWithVideo").is_some());
        assert!(json["voiceStats"].get("unmutedUsers").is_some());
    }
}
