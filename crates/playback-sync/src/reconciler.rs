//! Clock reconciliation.
//!
//! Given a peer's `{current_time, is_playing, timestamp}` and the local
//! player's state, compute the correction to apply:
//!
//! 1. `latency = max(0, now - timestamp)`; a report from the future is clock
//!    skew and counts as zero latency.
//! 2. `adjusted = current_time + latency + sync_buffer`
//! 3. Seek to `adjusted` only when `|local - adjusted|` is strictly above
//!    `sync_threshold`. Values at the threshold (within [`DRIFT_EPSILON`])
//!    do not seek, so repeated identical input stays a no-op.
//! 4. Play/pause independently to match the peer.

use crate::tuning::SyncTuning;

/// Float tolerance for the threshold comparison.
pub const DRIFT_EPSILON: f64 = 1e-6;

/// Playback state reported by a peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackReport {
    /// Position in seconds at `timestamp_ms`.
    pub current_time: f64,
    pub is_playing: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Local player state at reconciliation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPlayback {
    pub current_time: f64,
    pub is_playing: bool,
}

/// Play/pause transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Play,
    Pause,
}

/// What the local player should do.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Correction {
    pub seek_to: Option<f64>,
    pub transport: Option<Transport>,
}

impl Correction {
    /// Whether applying this correction changes nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.seek_to.is_none() && self.transport.is_none()
    }
}

/// Compute the correction for one peer report.
#[must_use]
pub fn reconcile(
    report: &PlaybackReport,
    local: &LocalPlayback,
    now_ms: i64,
    tuning: &SyncTuning,
) -> Correction {
    let latency_ms = now_ms.saturating_sub(report.timestamp_ms).max(0);
    // Millisecond latencies are far below f64's exact integer range
    #[allow(clippy::cast_precision_loss)]
    let latency = latency_ms as f64 / 1000.0;

    let adjusted = report.current_time + latency + tuning.sync_buffer;
    let drift = (local.current_time - adjusted).abs();

    let seek_to = (drift - tuning.sync_threshold > DRIFT_EPSILON).then_some(adjusted);

    let transport = match (report.is_playing, local.is_playing) {
        (true, false) => Some(Transport::Play),
        (false, true) => Some(Transport::Pause),
        _ => None,
    };

    Correction { seek_to, transport }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000_000;

    fn local(current_time: f64, is_playing: bool) -> LocalPlayback {
        LocalPlayback {
            current_time,
            is_playing,
        }
    }

    #[test]
    fn test_threshold_boundary_does_not_seek() {
        let report = PlaybackReport {
            current_time: 10.0,
            is_playing: true,
            timestamp_ms: NOW - 500,
        };
        let tuning = SyncTuning::default();

        // adjusted = 10.0 + 0.5 + 0.3 = 10.8, drift = 0.8 == threshold
        let first = reconcile(&report, &local(10.0, true), NOW, &tuning);
        assert!(first.is_noop(), "boundary drift must not seek: {first:?}");

        let second = reconcile(&report, &local(10.0, true), NOW, &tuning);
        assert_eq!(first, second);
    }

    #[test]
    fn test_large_drift_seeks_to_adjusted() {
        let report = PlaybackReport {
            current_time: 60.0,
            is_playing: true,
            timestamp_ms: NOW - 200,
        };
        let correction = reconcile(&report, &local(58.0, true), NOW, &SyncTuning::default());
        let target = correction.seek_to.unwrap();
        assert!((target - 60.5).abs() < 1e-9);
        assert!(correction.transport.is_none());
    }

    #[test]
    fn test_future_timestamp_counts_as_zero_latency() {
        let report = PlaybackReport {
            current_time: 30.0,
            is_playing: false,
            timestamp_ms: NOW + 5_000,
        };
        let correction = reconcile(&report, &local(20.0, false), NOW, &SyncTuning::default());
        let target = correction.seek_to.unwrap();
        assert!((target - 30.3).abs() < 1e-9);
    }

    #[test]
    fn test_transport_follows_remote() {
        let tuning = SyncTuning::default();
        let playing = PlaybackReport {
            current_time: 5.0,
            is_playing: true,
            timestamp_ms: NOW,
        };
        let paused = PlaybackReport {
            is_playing: false,
            ..playing
        };

        assert_eq!(
            reconcile(&playing, &local(5.3, false), NOW, &tuning).transport,
            Some(Transport::Play)
        );
        assert_eq!(
            reconcile(&paused, &local(5.3, true), NOW, &tuning).transport,
            Some(Transport::Pause)
        );
        assert!(reconcile(&paused, &local(5.3, false), NOW, &tuning).is_noop());
    }

    proptest! {
        #[test]
        fn prop_seek_lands_within_threshold(
            remote in 0.0f64..10_000.0,
            offset in -600.0f64..600.0,
            latency_ms in 0i64..5_000,
            playing in any::<bool>(),
        ) {
            let tuning = SyncTuning::default();
            let report = PlaybackReport {
                current_time: remote,
                is_playing: playing,
                timestamp_ms: NOW - latency_ms,
            };
            let correction = reconcile(&report, &local(remote + offset, playing), NOW, &tuning);
            prop_assert!(correction.transport.is_none());

            let settled = correction.seek_to.unwrap_or(remote + offset);
            let again = reconcile(&report, &local(settled, playing), NOW, &tuning);
            prop_assert!(again.seek_to.is_none());
        }
    }
}
