//! Metrics definitions for the room service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rs_` prefix for the room service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `actor_type`: 3 values (registry, room, connection)
//! - `event`: bounded by the client event set (~10 values)
//! - `code`: bounded by `RoomError::error_code` (8 values)
//! - `outcome`: bounded by `VoiceDecision` (5 values)
//! - `reason`: bounded eviction reasons (empty, expired, shutdown)
//!
//! Room codes and connection IDs are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Event handling is in-memory; most samples land well under 10ms
        .set_buckets_for_metric(
            Matcher::Prefix("rs_event".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rs_sweep".to_string()),
            &[0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.000, 5.000],
        )
        .map_err(|e| format!("Failed to set sweep duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Connection & Room Metrics (Gauges)
// ============================================================================

/// Set the number of open WebSocket connections.
///
/// Metric: `rs_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rs_connections_active").set(count as f64);
}

/// Set the number of live rooms.
///
/// Metric: `rs_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rs_rooms_active").set(count as f64);
}

/// Set the number of participants across all rooms.
///
/// Metric: `rs_participants_active`
pub fn set_participants_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rs_participants_active").set(count as f64);
}

// ============================================================================
// Actor Metrics
// ============================================================================

/// Set the mailbox depth for an actor type.
///
/// Metric: `rs_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rs_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

/// Metric: `rs_actor_panics_total`
/// Labels: `actor_type`
pub fn record_actor_panic(actor_type: &str) {
    counter!("rs_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record an outbound event dropped because a connection's mailbox was full
/// or already closed.
///
/// Metric: `rs_messages_dropped_total`
/// Labels: `actor_type`
pub fn record_message_dropped(actor_type: &str) {
    counter!("rs_messages_dropped_total", "actor_type" => actor_type.to_string()).increment(1);
}

// ============================================================================
// Event Metrics
// ============================================================================

/// Record how long an inbound client event took to handle.
///
/// Metric: `rs_event_latency_seconds`
/// Labels: `event`
pub fn record_event_latency(event: &str, duration: Duration) {
    histogram!("rs_event_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}

/// Record a client event rejected with an error event.
///
/// Metric: `rs_event_errors_total`
/// Labels: `event`, `code`
pub fn record_event_error(event: &str, code: &str) {
    counter!("rs_event_errors_total",
        "event" => event.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
}

/// Record the fan-out size of one room broadcast.
///
/// Metric: `rs_broadcast_recipients`
/// Labels: `event`
pub fn record_broadcast(event: &str, recipients: usize) {
    #[allow(clippy::cast_precision_loss)]
    histogram!("rs_broadcast_recipients", "event" => event.to_string()).record(recipients as f64);
}

/// Record the gate outcome for one voice payload.
///
/// Metric: `rs_voice_frames_total`
/// Labels: `outcome` (relayed, muted, disabled, oversized, not_member)
pub fn record_voice_frame(outcome: &str) {
    counter!("rs_voice_frames_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Room Lifecycle Metrics
// ============================================================================

/// Metric: `rs_rooms_created_total`
/// Labels: `status` (success, error)
pub fn record_room_created(status: &str) {
    counter!("rs_rooms_created_total", "status" => status.to_string()).increment(1);
}

/// Record a room leaving the registry.
///
/// Metric: `rs_room_evictions_total`
/// Labels: `reason` (empty, expired, shutdown)
pub fn record_room_eviction(reason: &str) {
    counter!("rs_room_evictions_total", "reason" => reason.to_string()).increment(1);
}

/// Metric: `rs_host_migrations_total`
pub fn record_host_migration() {
    counter!("rs_host_migrations_total").increment(1);
}

/// Record one sweep pass.
///
/// Metric: `rs_sweep_duration_seconds`, `rs_sweep_evicted_total`
pub fn record_sweep(duration: Duration, evicted: usize) {
    histogram!("rs_sweep_duration_seconds").record(duration.as_secs_f64());
    counter!("rs_sweep_evicted_total").increment(evicted as u64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // Without an installed recorder these write to the global no-op recorder.
    #[test]
    fn test_recording_without_recorder_is_safe() {
        set_connections_active(0);
        set_rooms_active(3);
        set_participants_active(12);
        set_actor_mailbox_depth("room", 40);
        record_actor_panic("room");
        record_message_dropped("connection");
        record_event_latency("video-sync", Duration::from_micros(300));
        record_event_error("send-message", "VALIDATION_ERROR");
        record_broadcast("new-message", 4);
        record_voice_frame("relayed");
        record_room_created("success");
        record_room_eviction("expired");
        record_host_migration();
        record_sweep(Duration::from_millis(2), 1);
    }

    #[test]
    fn test_metric_names_and_values() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_rooms_active(7);
            record_voice_frame("muted");
            record_voice_frame("muted");
            record_room_eviction("empty");
            record_event_latency("join-room", Duration::from_millis(1));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            snapshot
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(_, _, _, value)| match value {
                    DebugValue::Counter(c) => DebugValue::Counter(*c),
                    DebugValue::Gauge(g) => DebugValue::Gauge(*g),
                    DebugValue::Histogram(h) => DebugValue::Histogram(h.clone()),
                })
        };

        assert_eq!(
            find("rs_rooms_active"),
            Some(DebugValue::Gauge(7.0.into()))
        );
        assert_eq!(find("rs_voice_frames_total"), Some(DebugValue::Counter(2)));
        assert_eq!(find("rs_room_evictions_total"), Some(DebugValue::Counter(1)));
        assert!(matches!(
            find("rs_event_latency_seconds"),
            Some(DebugValue::Histogram(samples)) if samples.len() == 1
        ));
    }
}
