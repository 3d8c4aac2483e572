//! Watch Party room service.
//!
//! Authoritative state for synchronized group-viewing rooms:
//!
//! - Room lifecycle (create, join, leave, sweep) and host election
//! - Playback state that every participant converges on
//! - Chat history and voice status, with voice relay gated on that status
//! - Fan-out of room events to connected participants over WebSocket
//!
//! # Architecture
//!
//! ```text
//! RegistryActor (singleton)
//! └── RoomActor (one per live room, owns a state::Room)
//!         └── BroadcastRouter ──► ConnectionActor (one per WebSocket)
//! ```
//!
//! A WebSocket's read half feeds a [`session::Session`], which turns client
//! events into room requests. Rooms reply through the router.
//!
//! # Modules
//!
//! - [`actors`] - Registry, room and connection actors
//! - [`state`] - Synchronous room state machine
//! - [`router`] - Connection membership and event fan-out
//! - [`session`] - Per-connection event dispatch
//! - [`ws`] - WebSocket endpoint
//! - [`routes`] / [`handlers`] - HTTP API, health checks and static assets
//! - [`tasks`] - Background room sweeper
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-facing codes

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod router;
pub mod routes;
pub mod session;
pub mod state;
pub mod stats;
pub mod tasks;
pub mod ws;
