//! Room sweeper background task.
//!
//! Periodically removes rooms from the registry:
//! 1. Rooms with no participants
//! 2. Rooms older than the maximum room age, occupied or not
//!
//! Each pass logs server-wide totals afterwards. Evicted members are unbound
//! without being told; their next room-scoped event gets a not-in-room error.
//!
//! # Graceful Shutdown
//!
//! When the cancellation token is triggered the task finishes its current
//! pass and exits.

use crate::actors::RegistryActorHandle;
use crate::config::Config;
use crate::observability::metrics;
use crate::stats;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Configuration for the room sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSweeperConfig {
    /// Time between passes.
    pub interval: Duration,
    /// Rooms older than this are evicted even when occupied.
    pub max_room_age: Duration,
}

impl RoomSweeperConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sweep_interval(),
            max_room_age: config.max_room_age(),
        }
    }
}

/// Start the sweeper. Returns when `cancel_token` is cancelled.
///
/// The first pass runs one interval after start.
#[instrument(skip_all, name = "rs.task.sweeper")]
pub async fn start_room_sweeper(
    registry: RegistryActorHandle,
    config: RoomSweeperConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "rs.task.sweeper",
        interval_seconds = config.interval.as_secs(),
        max_room_age_seconds = config.max_room_age.as_secs(),
        "Starting room sweeper task"
    );

    let start = tokio::time::Instant::now() + config.interval;
    let mut interval = tokio::time::interval_at(start, config.interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_sweep(&registry, &config).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "rs.task.sweeper",
                    "Room sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "rs.task.sweeper", "Room sweeper task stopped");
}

/// Run a single sweep pass and log totals.
pub(crate) async fn run_sweep(registry: &RegistryActorHandle, config: &RoomSweeperConfig) {
    let started = Instant::now();
    let now_ms = chrono::Utc::now().timestamp_millis();

    match registry.sweep(now_ms, config.max_room_age).await {
        Ok(report) => {
            metrics::record_sweep(started.elapsed(), report.evicted());
            info!(
                target: "rs.task.sweeper",
                evicted_empty = report.evicted_empty,
                evicted_expired = report.evicted_expired,
                active_rooms = report.remaining,
                "Sweep completed"
            );
        }
        Err(e) => {
            error!(
                target: "rs.task.sweeper",
                error = %e,
                "Sweep failed"
            );
            return;
        }
    }

    let (connections, participants) = match registry.get_status().await {
        Ok(status) => (status.connection_count, status.participant_count),
        Err(_) => (0, 0),
    };

    match stats::collect(registry).await {
        Ok(totals) => {
            info!(
                target: "rs.task.sweeper",
                connections,
                participants,
                active_rooms = totals.active_rooms,
                total_users = totals.total_users,
                total_hosts = totals.total_hosts,
                rooms_with_video = totals.rooms_with_video,
                users_with_voice = totals.voice_stats.users_with_voice,
                unmuted_users = totals.voice_stats.unmuted_users,
                "Server stats"
            );
        }
        Err(e) => {
            error!(
                target: "rs.task.sweeper",
                error = %e,
                "Failed to collect server stats"
            );
        }
    }
}
