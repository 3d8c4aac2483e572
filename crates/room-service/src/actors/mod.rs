//! Actor hierarchy for the room service.
//!
//! ```text
//! RegistryActor (singleton)
//! └── supervises N RoomActors
//!     └── RoomActor (one per live room)
//!         ├── owns room state
//!         └── fans out through the BroadcastRouter
//!
//! ConnectionActor (one per WebSocket, owns the write half)
//! ```
//!
//! # Key Design Decisions
//!
//! - **One room per connection**: joining a second room leaves the first
//! - **Serialized rooms**: every request for a room runs on its actor, in
//!   arrival order
//! - **Non-blocking fan-out**: rooms enqueue outbound events without waiting;
//!   a slow client loses events rather than stalling its room
//! - **CancellationToken propagation**: the registry hands each room a child
//!   token, so cancelling the registry stops every room
//!
//! # Modules
//!
//! - [`registry`] - `RegistryActor`, mints codes and supervises rooms
//! - [`room`] - `RoomActor` per live room
//! - [`connection`] - `ConnectionActor` per WebSocket
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod connection;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

pub use connection::{ConnectionActor, ConnectionActorHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use registry::{RegistryActor, RegistryActorHandle, RegistrySettings};
pub use room::{RoomActor, RoomActorHandle};
