//! Synchronous room state, free of I/O.

pub mod room;
pub mod voice_gate;

pub use room::{
    validate_display_name, HostPromotion, JoinOutcome, LeaveOutcome, Room,
};
pub use voice_gate::VoiceDecision;
