//! Voice relay gate.
//!
//! A voice payload is relayed only when its sender is a member with voice
//! enabled and not muted. Everything else is dropped without telling the
//! sender; the outcome is only counted.

use sync_protocol::VoiceStatus;

/// Outcome of gating one voice payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceDecision {
    Relay,
    Muted,
    Disabled,
    Oversized,
    NotAMember,
}

impl VoiceDecision {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            VoiceDecision::Relay => "relayed",
            VoiceDecision::Muted => "muted",
            VoiceDecision::Disabled => "disabled",
            VoiceDecision::Oversized => "oversized",
            VoiceDecision::NotAMember => "not_member",
        }
    }

    #[must_use]
    pub const fn is_relay(&self) -> bool {
        matches!(self, VoiceDecision::Relay)
    }
}

/// Gate a payload of `payload_len` bytes from a sender with `status`
/// (`None` when the sender is not in the room).
#[must_use]
pub fn evaluate(
    status: Option<VoiceStatus>,
    payload_len: usize,
    max_payload_bytes: usize,
) -> VoiceDecision {
    let Some(status) = status else {
        return VoiceDecision::NotAMember;
    };
    if status.is_muted {
        return VoiceDecision::Muted;
    }
    if !status.is_voice_enabled {
        return VoiceDecision::Disabled;
    }
    if payload_len > max_payload_bytes {
        return VoiceDecision::Oversized;
    }
    VoiceDecision::Relay
}
