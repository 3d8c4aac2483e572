//! Identifier types shared by clients and the room service.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of generated room codes.
pub const ROOM_CODE_LENGTH: usize = 8;

/// Upper bound accepted when parsing a room code supplied by a client.
pub const MAX_ROOM_CODE_LENGTH: usize = 32;

/// Errors raised when a client-supplied room code is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomCodeError {
    #[error("Room code is empty")]
    Empty,

    #[error("Room code exceeds {MAX_ROOM_CODE_LENGTH} characters")]
    TooLong,

    #[error("Room code must be alphanumeric")]
    InvalidCharacter,
}

/// Opaque, uppercase alphanumeric room identifier.
///
/// Lookups are case-insensitive: every constructor normalizes to uppercase,
/// so `abc123` and `ABC123` name the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse and normalize a client-supplied room code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty after trimming, too long, or
    /// contains anything other than ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self, RoomCodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoomCodeError::Empty);
        }
        if trimmed.len() > MAX_ROOM_CODE_LENGTH {
            return Err(RoomCodeError::TooLong);
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RoomCodeError::InvalidCharacter);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Borrow the normalized code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RoomCode::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identity of one live client connection.
///
/// Unique for the lifetime of the process; a reconnecting client gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random connection ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
