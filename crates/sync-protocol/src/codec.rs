//! Text frame codec.
//!
//! Frames are UTF-8 JSON. Decoding is bounded by [`MAX_FRAME_BYTES`] so an
//! oversized frame is rejected before any parsing work.

use crate::events::{ClientEvent, ServerEvent};

/// Largest text frame accepted from a peer.
pub const MAX_FRAME_BYTES: usize = 512 * 1024;

/// Error type for codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame exceeds [`MAX_FRAME_BYTES`]
    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Frame is not a well-formed event
    #[error("Invalid frame: {0}")]
    InvalidFormat(String),

    /// Event could not be serialized
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Decode a client event from a text frame
///
/// # Errors
///
/// Returns an error if the frame is too large or is not a known client event
pub fn decode_client_event(frame: &str) -> Result<ClientEvent, CodecError> {
    check_size(frame)?;
    serde_json::from_str(frame).map_err(|e| CodecError::InvalidFormat(e.to_string()))
}

/// Encode a server event to a text frame
///
/// # Errors
///
/// Returns an error if serialization fails
pub fn encode_server_event(event: &ServerEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a server event from a text frame (client side)
///
/// # Errors
///
/// Returns an error if the frame is too large or is not a known server event
pub fn decode_server_event(frame: &str) -> Result<ServerEvent, CodecError> {
    check_size(frame)?;
    serde_json::from_str(frame).map_err(|e| CodecError::InvalidFormat(e.to_string()))
}

/// Encode a client event to a text frame (client side)
///
/// # Errors
///
/// Returns an error if serialization fails
pub fn encode_client_event(event: &ClientEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Encode(e.to_string()))
}

fn check_size(frame: &str) -> Result<(), CodecError> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(CodecError::FrameTooLarge(frame.len()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::RoomCode;

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let frame = "x".repeat(MAX_FRAME_BYTES + 1);
        assert!(matches!(
            decode_client_event(&frame),
            Err(CodecError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let result = decode_client_event(r#"{"type":"kick-user","roomId":"ROOM0001"}"#);
        assert!(matches!(result, Err(CodecError::InvalidFormat(_))));
    }

    #[test]
    fn test_decode_rejects_bad_room_code() {
        let result = decode_client_event(r#"{"type":"request-sync","roomId":"no spaces"}"#);
        assert!(matches!(result, Err(CodecError::InvalidFormat(_))));
    }

    #[test]
    fn test_client_frame_survives_codec() {
        let event = ClientEvent::SendMessage {
            room_id: RoomCode::parse("ROOM0001").unwrap(),
            message: "hello".to_string(),
        };
        let frame = encode_client_event(&event).unwrap();
        assert!(frame.contains(r#""type":"send-message""#));
        assert_eq!(decode_client_event(&frame).unwrap(), event);
    }

    #[test]
    fn test_server_pong_frame() {
        let frame = encode_server_event(&ServerEvent::Pong { timestamp: 42 }).unwrap();
        assert_eq!(frame, r#"{"type":"pong","timestamp":42}"#);
        assert_eq!(
            decode_server_event(&frame).unwrap(),
            ServerEvent::Pong { timestamp: 42 }
        );
    }
}
