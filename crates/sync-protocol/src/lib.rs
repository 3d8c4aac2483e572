//! Wire protocol for synchronized watch rooms.
//!
//! Clients and the room service exchange JSON text frames. Every frame is an
//! object with a `type` discriminator (`join-room`, `video-synced`, ...) and
//! camelCase fields.
//!
//! # Modules
//!
//! - [`types`] - Room codes and connection identifiers
//! - [`media`] - Media source detection from user-supplied URLs
//! - [`model`] - Shared room state views and partial-update patches
//! - [`events`] - Inbound and outbound event enums
//! - [`codec`] - Text frame encoding and decoding

#![warn(clippy::pedantic)]

pub mod codec;
pub mod events;
pub mod media;
pub mod model;
pub mod types;

pub use codec::CodecError;
pub use events::{ClientEvent, ServerEvent};
pub use media::{MediaParseError, MediaSource};
pub use model::{
    ChatMessage, ParticipantInfo, VideoPatch, VideoState, VoiceStats, VoiceStatus,
    VoiceStatusPatch,
};
pub use types::{ConnectionId, RoomCode, RoomCodeError};
