//! HTTP request handlers.

pub mod metrics;
pub mod rooms;

pub use metrics::metrics_handler;
pub use rooms::{create_room, get_room, get_stats};
