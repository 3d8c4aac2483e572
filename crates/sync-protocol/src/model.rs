//! Room state as seen on the wire, plus the typed partial updates clients send.

use crate::media::MediaSource;
use crate::types::ConnectionId;
use serde::{Deserialize, Serialize};

/// Voice state of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStatus {
    pub is_muted: bool,
    pub is_voice_enabled: bool,
}

impl VoiceStatus {
    /// Status assigned on join: hosts start unmuted, everyone else muted.
    /// Nobody starts with voice enabled.
    #[must_use]
    pub const fn on_join(is_host: bool) -> Self {
        Self {
            is_muted: !is_host,
            is_voice_enabled: false,
        }
    }

    /// Status assigned to a participant promoted to host.
    #[must_use]
    pub const fn promoted() -> Self {
        Self {
            is_muted: false,
            is_voice_enabled: true,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &VoiceStatusPatch) {
        if let Some(is_muted) = patch.is_muted {
            self.is_muted = is_muted;
        }
        if let Some(is_voice_enabled) = patch.is_voice_enabled {
            self.is_voice_enabled = is_voice_enabled;
        }
    }
}

/// Partial voice status update. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoiceStatusPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_voice_enabled: Option<bool>,
}

/// Partial video state update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VideoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl VideoPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.current_time.is_none()
            && self.is_playing.is_none()
            && self.duration.is_none()
    }
}

/// Shared playback state of a room. Last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoState {
    pub url: Option<String>,
    pub source: Option<MediaSource>,
    /// Playback position in seconds.
    pub current_time: f64,
    pub is_playing: bool,
    /// Wall clock of the last update, milliseconds since the Unix epoch.
    pub last_update: i64,
    pub duration: Option<f64>,
    /// Channel name when the source is a live platform.
    pub channel: Option<String>,
}

impl VideoState {
    /// Empty state for a freshly created room.
    #[must_use]
    pub const fn empty(now_ms: i64) -> Self {
        Self {
            url: None,
            source: None,
            current_time: 0.0,
            is_playing: false,
            last_update: now_ms,
            duration: None,
            channel: None,
        }
    }
}

/// One chat line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Roster entry sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub connection_id: ConnectionId,
    pub username: String,
    pub is_host: bool,
    /// Milliseconds since the Unix epoch.
    pub joined_at: i64,
    pub voice_status: VoiceStatus,
}

/// Aggregate voice counters for a room or the whole server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStats {
    pub total_users: usize,
    /// Participants with voice enabled.
    pub users_with_voice: usize,
    /// Participants with voice enabled and not muted.
    pub unmuted_users: usize,
}

impl VoiceStats {
    /// Add another set of counters.
    #[must_use]
    pub const fn merge(self, other: VoiceStats) -> Self {
        Self {
            total_users: self.total_users + other.total_users,
            users_with_voice: self.users_with_voice + other.users_with_voice,
            unmuted_users: self.unmuted_users + other.unmuted_users,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_status_defaults() {
        assert_eq!(
            VoiceStatus::on_join(true),
            VoiceStatus {
                is_muted: false,
                is_voice_enabled: false
            }
        );
        assert_eq!(
            VoiceStatus::on_join(false),
            VoiceStatus {
                is_muted: true,
                is_voice_enabled: false
            }
        );
    }

    #[test]
    fn test_voice_status_partial_apply() {
        let mut status = VoiceStatus::on_join(false);
        status.apply(&VoiceStatusPatch {
            is_muted: None,
            is_voice_enabled: Some(true),
        });
        assert!(status.is_muted);
        assert!(status.is_voice_enabled);
    }

    #[test]
    fn test_video_patch_rejects_unknown_fields() {
        let ok: VideoPatch = serde_json::from_str(r#"{"currentTime": 12.5}"#).unwrap();
        assert_eq!(ok.current_time, Some(12.5));
        assert!(ok.url.is_none());

        let bad: Result<VideoPatch, _> = serde_json::from_str(r#"{"currentTime": 1, "host": "x"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_voice_stats_merge() {
        let a = VoiceStats {
            total_users: 3,
            users_with_voice: 2,
            unmuted_users: 1,
        };
        let total = a.merge(a);
        assert_eq!(total.total_users, 6);
        assert_eq!(total.unmuted_users, 2);
    }
}
