//! Observability for the room service.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit fields.
//! Chat text, display names and voice payloads are never logged or used as
//! metric labels.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `rs_connections_active` | Gauge | none |
//! | `rs_rooms_active` | Gauge | none |
//! | `rs_participants_active` | Gauge | none |
//! | `rs_actor_mailbox_depth` | Gauge | `actor_type` |
//! | `rs_actor_panics_total` | Counter | `actor_type` |
//! | `rs_messages_dropped_total` | Counter | `actor_type` |
//! | `rs_event_latency_seconds` | Histogram | `event` |
//! | `rs_event_errors_total` | Counter | `event`, `code` |
//! | `rs_broadcast_recipients` | Histogram | `event` |
//! | `rs_voice_frames_total` | Counter | `outcome` |
//! | `rs_rooms_created_total` | Counter | `status` |
//! | `rs_room_evictions_total` | Counter | `reason` |
//! | `rs_host_migrations_total` | Counter | none |
//! | `rs_sweep_duration_seconds` | Histogram | none |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
