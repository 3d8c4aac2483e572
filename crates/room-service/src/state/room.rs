//! Authoritative state of one room.
//!
//! `Room` is a plain synchronous state machine: it validates and applies one
//! request at a time and returns a typed outcome describing what changed. It
//! performs no I/O; the owning actor turns outcomes into outbound events.
//!
//! Each member's participant record and voice status live in a single entry,
//! so they are always added and removed together.
//!
//! # Host election
//!
//! - The first participant to join an empty room becomes host, unmuted.
//! - When the host leaves and others remain, the earliest-joined remaining
//!   participant is promoted and its voice is set to unmuted and enabled.
//! - A non-empty room always has exactly one host.

use crate::config::RoomLimits;
use crate::errors::RoomError;
use crate::state::voice_gate::{self, VoiceDecision};
use std::collections::VecDeque;
use sync_protocol::{
    ChatMessage, ConnectionId, MediaSource, ParticipantInfo, RoomCode, VideoPatch, VideoState,
    VoiceStats, VoiceStatus, VoiceStatusPatch,
};

#[derive(Debug, Clone)]
struct Member {
    connection_id: ConnectionId,
    username: String,
    joined_at: i64,
    /// Tie-breaker for joins within the same millisecond.
    join_seq: u64,
    is_host: bool,
    voice: VoiceStatus,
}

impl Member {
    fn to_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            connection_id: self.connection_id.clone(),
            username: self.username.clone(),
            is_host: self.is_host,
            joined_at: self.joined_at,
            voice_status: self.voice,
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub participant: ParticipantInfo,
    pub is_host: bool,
    /// The connection was already a member; nothing changed.
    pub rejoined: bool,
}

/// A participant promoted to host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPromotion {
    pub connection_id: ConnectionId,
    pub username: String,
}

/// Result of a leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub departed: ParticipantInfo,
    pub was_host: bool,
    pub promotion: Option<HostPromotion>,
    pub room_empty: bool,
}

/// State of one room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    created_at: i64,
    limits: RoomLimits,
    members: Vec<Member>,
    next_join_seq: u64,
    video: VideoState,
    chat: VecDeque<ChatMessage>,
}

/// Trim a display name. Any non-empty name is accepted.
///
/// # Errors
///
/// Returns `RoomError::Validation` if the name is empty after trimming.
pub fn validate_display_name(raw: &str) -> Result<String, RoomError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoomError::Validation("Username is required".to_string()));
    }
    Ok(name.to_string())
}

impl Room {
    #[must_use]
    pub fn new(code: RoomCode, created_at: i64, limits: RoomLimits) -> Self {
        Self {
            code,
            created_at,
            limits,
            members: Vec::new(),
            next_join_seq: 0,
            video: VideoState::empty(created_at),
            chat: VecDeque::with_capacity(limits.chat_history_capacity),
        }
    }

    #[must_use]
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    #[must_use]
    pub fn limits(&self) -> &RoomLimits {
        &self.limits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn is_member(&self, connection_id: &ConnectionId) -> bool {
        self.member(connection_id).is_some()
    }

    #[must_use]
    pub fn video(&self) -> &VideoState {
        &self.video
    }

    /// Roster in join order.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        self.members.iter().map(Member::to_info).collect()
    }

    #[must_use]
    pub fn participant(&self, connection_id: &ConnectionId) -> Option<ParticipantInfo> {
        self.member(connection_id).map(Member::to_info)
    }

    #[must_use]
    pub fn host(&self) -> Option<ParticipantInfo> {
        self.members.iter().find(|m| m.is_host).map(Member::to_info)
    }

    /// Full chat history, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.chat.iter().cloned().collect()
    }

    /// The most recent `count` messages, oldest first.
    #[must_use]
    pub fn recent_messages(&self, count: usize) -> Vec<ChatMessage> {
        let skip = self.chat.len().saturating_sub(count);
        self.chat.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn voice_stats(&self) -> VoiceStats {
        VoiceStats {
            total_users: self.members.len(),
            users_with_voice: self
                .members
                .iter()
                .filter(|m| m.voice.is_voice_enabled)
                .count(),
            unmuted_users: self
                .members
                .iter()
                .filter(|m| m.voice.is_voice_enabled && !m.voice.is_muted)
                .count(),
        }
    }

    /// Add a participant.
    ///
    /// A connection that is already a member keeps its name, host role and
    /// voice status; the outcome is flagged `rejoined`.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Validation` for an empty name. The room is
    /// unchanged on error.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        raw_username: &str,
        now_ms: i64,
    ) -> Result<JoinOutcome, RoomError> {
        let username = validate_display_name(raw_username)?;
        if let Some(existing) = self.member(&connection_id) {
            return Ok(JoinOutcome {
                participant: existing.to_info(),
                is_host: existing.is_host,
                rejoined: true,
            });
        }

        let is_host = self.members.is_empty();
        let member = Member {
            connection_id,
            username,
            joined_at: now_ms,
            join_seq: self.next_join_seq,
            is_host,
            voice: VoiceStatus::on_join(is_host),
        };
        self.next_join_seq += 1;

        let participant = member.to_info();
        self.members.push(member);

        Ok(JoinOutcome {
            participant,
            is_host,
            rejoined: false,
        })
    }

    /// Remove a participant, promoting a successor if the host left.
    ///
    /// Returns `None` if the connection was not a member.
    pub fn leave(&mut self, connection_id: &ConnectionId) -> Option<LeaveOutcome> {
        let index = self
            .members
            .iter()
            .position(|m| &m.connection_id == connection_id)?;
        let departed = self.members.remove(index);
        let was_host = departed.is_host;

        let promotion = if was_host {
            self.elect_successor()
        } else {
            None
        };

        Some(LeaveOutcome {
            departed: departed.to_info(),
            was_host,
            promotion,
            room_empty: self.members.is_empty(),
        })
    }

    /// Promote the earliest-joined member. No-op on an empty room.
    fn elect_successor(&mut self) -> Option<HostPromotion> {
        let successor = self
            .members
            .iter_mut()
            .min_by_key(|m| (m.joined_at, m.join_seq))?;
        successor.is_host = true;
        successor.voice = VoiceStatus::promoted();
        Some(HostPromotion {
            connection_id: successor.connection_id.clone(),
            username: successor.username.clone(),
        })
    }

    /// Merge a partial video update. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or a numeric field is not a
    /// finite non-negative number. Nothing is applied on error.
    pub fn update_video(&mut self, patch: &VideoPatch, now_ms: i64) -> Result<&VideoState, RoomError> {
        let source = patch
            .url
            .as_deref()
            .map(MediaSource::parse)
            .transpose()?;
        if let Some(current_time) = patch.current_time {
            check_seconds("currentTime", current_time)?;
        }
        if let Some(duration) = patch.duration {
            check_seconds("duration", duration)?;
        }

        if let (Some(url), Some(source)) = (&patch.url, source) {
            self.video.url = Some(url.trim().to_string());
            self.video.channel = source.channel().map(str::to_string);
            self.video.source = Some(source);
        }
        if let Some(current_time) = patch.current_time {
            self.video.current_time = current_time;
        }
        if let Some(is_playing) = patch.is_playing {
            self.video.is_playing = is_playing;
        }
        if let Some(duration) = patch.duration {
            self.video.duration = Some(duration);
        }
        self.video.last_update = now_ms;

        Ok(&self.video)
    }

    /// Replace the video. Playback restarts at 0, paused.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse. Nothing is applied on error.
    pub fn change_video(&mut self, url: &str, now_ms: i64) -> Result<&VideoState, RoomError> {
        let source = MediaSource::parse(url)?;
        self.video = VideoState {
            url: Some(url.trim().to_string()),
            channel: source.channel().map(str::to_string),
            source: Some(source),
            current_time: 0.0,
            is_playing: false,
            last_update: now_ms,
            duration: None,
        };
        Ok(&self.video)
    }

    /// Merge a partial voice status update into the caller's own status.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::NotAMember` if the connection has not joined.
    pub fn update_voice_status(
        &mut self,
        connection_id: &ConnectionId,
        patch: &VoiceStatusPatch,
    ) -> Result<ParticipantInfo, RoomError> {
        let code = self.code.to_string();
        let member = self
            .members
            .iter_mut()
            .find(|m| &m.connection_id == connection_id)
            .ok_or(RoomError::NotAMember(code))?;
        member.voice.apply(patch);
        Ok(member.to_info())
    }

    /// Append a chat message, evicting the oldest past capacity.
    ///
    /// # Errors
    ///
    /// Returns an error for non-members and for empty or oversized text.
    pub fn add_message(
        &mut self,
        connection_id: &ConnectionId,
        text: &str,
        now_ms: i64,
    ) -> Result<ChatMessage, RoomError> {
        let username = self
            .member(connection_id)
            .map(|m| m.username.clone())
            .ok_or_else(|| RoomError::NotAMember(self.code.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RoomError::Validation("Message cannot be empty".to_string()));
        }
        if text.chars().count() > self.limits.max_message_length {
            return Err(RoomError::Validation(format!(
                "Message must be at most {} characters",
                self.limits.max_message_length
            )));
        }

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            message: text.to_string(),
            timestamp: now_ms,
        };

        self.chat.push_back(message.clone());
        while self.chat.len() > self.limits.chat_history_capacity {
            self.chat.pop_front();
        }

        Ok(message)
    }

    /// Gate a voice payload from `connection_id`.
    #[must_use]
    pub fn gate_voice(&self, connection_id: &ConnectionId, payload_len: usize) -> VoiceDecision {
        voice_gate::evaluate(
            self.member(connection_id).map(|m| m.voice),
            payload_len,
            self.limits.max_voice_payload_bytes,
        )
    }

    fn member(&self, connection_id: &ConnectionId) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| &m.connection_id == connection_id)
    }
}

fn check_seconds(field: &str, value: f64) -> Result<(), RoomError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RoomError::Validation(format!(
            "{field} must be a non-negative number"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T0: i64 = 1_700_000_000_000;

    fn room() -> Room {
        Room::new(RoomCode::parse("ROOM0001").unwrap(), T0, RoomLimits::default())
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    #[test]
    fn test_first_joiner_is_unmuted_host() {
        let mut room = room();
        let first = room.join(conn("c1"), "  alex ", T0).unwrap();
        assert!(first.is_host);
        assert_eq!(first.participant.username, "alex");
        assert_eq!(first.participant.voice_status, VoiceStatus::on_join(true));
        assert!(!first.participant.voice_status.is_muted);

        let second = room.join(conn("c2"), "sam", T0 + 1).unwrap();
        assert!(!second.is_host);
        assert!(second.participant.voice_status.is_muted);
        assert!(!second.participant.voice_status.is_voice_enabled);
    }

    #[test]
    fn test_join_rejects_blank_name_without_mutation() {
        let mut room = room();
        let err = room.join(conn("c1"), "   ", T0).unwrap_err();
        assert!(matches!(err, RoomError::Validation(_)));
        assert!(room.is_empty());
    }

    #[test]
    fn test_repeat_join_keeps_membership() {
        let mut room = room();
        room.join(conn("c1"), "alex", T0).unwrap();
        room.join(conn("c2"), "sam", T0 + 1).unwrap();

        let again = room.join(conn("c1"), "alexander", T0 + 50).unwrap();
        assert!(again.rejoined);
        assert!(again.is_host);
        assert_eq!(again.participant.username, "alex");
        assert_eq!(again.participant.joined_at, T0);
        assert_eq!(room.len(), 2);
        assert_eq!(room.host().map(|h| h.connection_id), Some(conn("c1")));
    }

    #[test]
    fn test_long_display_name_is_accepted() {
        let mut room = room();
        let name = "n".repeat(500);
        let outcome = room.join(conn("c1"), &format!("  {name}  "), T0).unwrap();
        assert_eq!(outcome.participant.username, name);
        assert_eq!(validate_display_name("\t sam \n").unwrap(), "sam");
    }

    #[test]
    fn test_host_leave_promotes_earliest_joined() {
        let mut room = room();
        room.join(conn("host"), "alex", T0).unwrap();
        room.join(conn("c2"), "sam", T0 + 10).unwrap();
        room.join(conn("c3"), "kim", T0 + 20).unwrap();

        let outcome = room.leave(&conn("host")).unwrap();
        assert!(outcome.was_host);
        assert!(!outcome.room_empty);
        let promotion = outcome.promotion.unwrap();
        assert_eq!(promotion.connection_id, conn("c2"));
        assert_eq!(promotion.username, "sam");

        let host = room.host().unwrap();
        assert_eq!(host.connection_id, conn("c2"));
        assert_eq!(host.voice_status, VoiceStatus::promoted());
    }

    #[test]
    fn test_non_host_leave_keeps_host() {
        let mut room = room();
        room.join(conn("host"), "alex", T0).unwrap();
        room.join(conn("c2"), "sam", T0 + 1).unwrap();

        let outcome = room.leave(&conn("c2")).unwrap();
        assert!(!outcome.was_host);
        assert!(outcome.promotion.is_none());
        assert_eq!(room.host().unwrap().connection_id, conn("host"));
        assert!(room.leave(&conn("c2")).is_none());
    }

    #[test]
    fn test_last_leave_reports_empty() {
        let mut room = room();
        room.join(conn("c1"), "alex", T0).unwrap();
        let outcome = room.leave(&conn("c1")).unwrap();
        assert!(outcome.room_empty);
        assert!(outcome.promotion.is_none());
        assert!(room.host().is_none());
    }

    #[test]
    fn test_chat_ring_evicts_oldest() {
        let mut room = room();
        room.join(conn("c1"), "alex", T0).unwrap();

        for i in 0..101 {
            room.add_message(&conn("c1"), &format!("msg {i}"), T0 + i)
                .unwrap();
        }

        let history = room.messages();
        assert_eq!(history.len(), 100);
        assert_eq!(history.first().unwrap().message, "msg 1");
        assert_eq!(history.last().unwrap().message, "msg 100");

        let recent = room.recent_messages(50);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent.first().unwrap().message, "msg 51");
    }

    #[test]
    fn test_chat_rejects_non_member_and_blank() {
        let mut room = room();
        room.join(conn("c1"), "alex", T0).unwrap();

        assert!(matches!(
            room.add_message(&conn("ghost"), "hi", T0),
            Err(RoomError::NotAMember(_))
        ));
        assert!(matches!(
            room.add_message(&conn("c1"), "   ", T0),
            Err(RoomError::Validation(_))
        ));
        let long = "x".repeat(RoomLimits::default().max_message_length + 1);
        assert!(room.add_message(&conn("c1"), &long, T0).is_err());
        assert!(room.messages().is_empty());
    }

    #[test]
    fn test_update_video_merges_partial_fields() {
        let mut room = room();
        room.change_video("https://youtu.be/dQw4w9WgXcQ", T0).unwrap();

        let patch = VideoPatch {
            current_time: Some(42.0),
            is_playing: Some(true),
            ..VideoPatch::default()
        };
        let video = room.update_video(&patch, T0 + 5).unwrap().clone();
        assert_eq!(video.current_time, 42.0);
        assert!(video.is_playing);
        assert_eq!(video.last_update, T0 + 5);
        assert_eq!(
            video.source,
            Some(MediaSource::Youtube {
                video_id: "dQw4w9WgXcQ".to_string()
            })
        );
    }

    #[test]
    fn test_update_video_bad_url_rejects_whole_patch() {
        let mut room = room();
        let before = room.video().clone();
        let patch = VideoPatch {
            url: Some("https://www.youtube.com/watch?v=bad".to_string()),
            current_time: Some(99.0),
            ..VideoPatch::default()
        };
        assert!(matches!(
            room.update_video(&patch, T0 + 1),
            Err(RoomError::InvalidMedia(_))
        ));
        assert_eq!(room.video(), &before);
    }

    #[test]
    fn test_update_video_rejects_negative_time() {
        let mut room = room();
        let patch = VideoPatch {
            current_time: Some(-1.0),
            ..VideoPatch::default()
        };
        assert!(room.update_video(&patch, T0).is_err());
    }

    #[test]
    fn test_change_video_resets_playback_and_tracks_channel() {
        let mut room = room();
        room.update_video(
            &VideoPatch {
                current_time: Some(300.0),
                is_playing: Some(true),
                ..VideoPatch::default()
            },
            T0,
        )
        .unwrap();

        let video = room.change_video("twitch.tv/Caster", T0 + 1).unwrap();
        assert_eq!(video.current_time, 0.0);
        assert!(!video.is_playing);
        assert_eq!(video.channel.as_deref(), Some("caster"));
    }

    #[test]
    fn test_voice_status_and_gate() {
        let mut room = room();
        room.join(conn("host"), "alex", T0).unwrap();
        room.join(conn("c2"), "sam", T0 + 1).unwrap();

        assert_eq!(room.gate_voice(&conn("c2"), 10), VoiceDecision::Muted);
        room.update_voice_status(
            &conn("c2"),
            &VoiceStatusPatch {
                is_muted: Some(false),
                is_voice_enabled: Some(true),
            },
        )
        .unwrap();
        assert_eq!(room.gate_voice(&conn("c2"), 10), VoiceDecision::Relay);
        assert_eq!(room.gate_voice(&conn("ghost"), 10), VoiceDecision::NotAMember);

        let stats = room.voice_stats();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.users_with_voice, 1);
        assert_eq!(stats.unmuted_users, 1);

        assert!(matches!(
            room.update_voice_status(&conn("ghost"), &VoiceStatusPatch::default()),
            Err(RoomError::NotAMember(_))
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Join(u8),
        Leave(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0u8..6).prop_map(Op::Join), (0u8..6).prop_map(Op::Leave)]
    }

    proptest! {
        #[test]
        fn prop_exactly_one_host_when_occupied(ops in proptest::collection::vec(op(), 1..60)) {
            let mut room = room();
            for (step, op) in ops.into_iter().enumerate() {
                let now = T0 + i64::try_from(step).unwrap();
                match op {
                    Op::Join(id) => {
                        let _ = room.join(conn(&format!("c{id}")), "user", now);
                    }
                    Op::Leave(id) => {
                        let before = room.participants();
                        if let Some(outcome) = room.leave(&conn(&format!("c{id}"))) {
                            if let Some(promotion) = outcome.promotion {
                                let expected = before
                                    .iter()
                                    .filter(|p| p.connection_id != outcome.departed.connection_id)
                                    .min_by_key(|p| p.joined_at)
                                    .unwrap();
                                prop_assert_eq!(&promotion.connection_id, &expected.connection_id);
                            }
                        }
                    }
                }

                let hosts: Vec<_> = room.participants().into_iter().filter(|p| p.is_host).collect();
                if room.is_empty() {
                    prop_assert!(hosts.is_empty());
                } else {
                    prop_assert_eq!(hosts.len(), 1);
                    prop_assert!(!hosts.first().unwrap().voice_status.is_muted);
                }
            }
        }
    }
}
