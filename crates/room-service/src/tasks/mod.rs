//! Background tasks.
//!
//! - `room_sweeper` - Evicts empty and expired rooms, logs server totals

pub mod room_sweeper;

pub use room_sweeper::{start_room_sweeper, RoomSweeperConfig};
