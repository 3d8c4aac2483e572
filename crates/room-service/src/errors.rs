//! Room service error types.
//!
//! Errors reach clients two ways: as an `error` event on the originating
//! WebSocket connection, or as a JSON body on the HTTP API. Both use
//! [`RoomError::client_message`], which never includes internal details;
//! those are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sync_protocol::{MediaParseError, ServerEvent};
use thiserror::Error;

/// Room service error type.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Room does not exist (never created, swept, or just emptied).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Request failed validation (empty name, oversized message, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Video URL could not be parsed.
    #[error("Invalid media URL: {0}")]
    InvalidMedia(#[from] MediaParseError),

    /// Connection acted on a room it has not joined.
    #[error("Connection is not a member of room {0}")]
    NotAMember(String),

    /// Registry is at its room limit.
    #[error("Room capacity exceeded")]
    CapacityExceeded,

    /// Service is shutting down.
    #[error("Service is draining")]
    Draining,

    /// Inbound frame could not be decoded.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Stable error code sent to clients.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            RoomError::Validation(_) => "VALIDATION_ERROR",
            RoomError::InvalidMedia(_) => "INVALID_URL",
            RoomError::NotAMember(_) => "NOT_IN_ROOM",
            RoomError::CapacityExceeded => "CAPACITY_EXCEEDED",
            RoomError::Draining => "SHUTTING_DOWN",
            RoomError::InvalidFrame(_) => "INVALID_MESSAGE",
            RoomError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RoomError::RoomNotFound(_) => "Room not found".to_string(),
            RoomError::Validation(reason) => reason.clone(),
            RoomError::InvalidMedia(e) => e.to_string(),
            RoomError::NotAMember(_) => "You are not in this room".to_string(),
            RoomError::CapacityExceeded => {
                "Server is at room capacity, please try again later".to_string()
            }
            RoomError::Draining => "Server is shutting down, please reconnect".to_string(),
            RoomError::InvalidFrame(_) => "Invalid message".to_string(),
            RoomError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// HTTP status for API responses.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            RoomError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            RoomError::Validation(_)
            | RoomError::InvalidMedia(_)
            | RoomError::InvalidFrame(_) => StatusCode::BAD_REQUEST,
            RoomError::NotAMember(_) => StatusCode::FORBIDDEN,
            RoomError::CapacityExceeded | RoomError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            RoomError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error` event sent back to the originating connection.
    #[must_use]
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.error_code().to_string(),
            message: self.client_message(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        if let RoomError::Internal(detail) = &self {
            tracing::error!(target: "rs.http", error = %detail, "Internal error");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}
