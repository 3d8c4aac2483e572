//! # Room Test Utilities
//!
//! Shared helpers for end-to-end tests of the room service:
//! - `TestRoomServer` - the real service on a random local port
//! - `TestWsClient` - a WebSocket client speaking the room protocol
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestRoomServer::spawn().await?;
//!     let room_id = server.create_room().await?;
//!     let (mut alex, _snapshot) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
//!     alex.close().await
//! }
//! ```

pub mod server_harness;
pub mod ws_client;

pub use server_harness::TestRoomServer;
pub use ws_client::TestWsClient;
