//! Outbound report gating.
//!
//! Applying a correction makes the local player fire its own seek/play/pause
//! events. Without gating, those would be reported back to the room and the
//! peers would chase each other. The governor drops outbound reports while a
//! correction's cooldown is active and spaces all other reports at least one
//! cooldown apart.

use std::time::{Duration, Instant};

/// Suppression window and rate limit for outbound playback reports.
#[derive(Debug, Clone)]
pub struct SyncGovernor {
    cooldown: Duration,
    suppressed_until: Option<Instant>,
    last_emit: Option<Instant>,
}

impl SyncGovernor {
    #[must_use]
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            suppressed_until: None,
            last_emit: None,
        }
    }

    /// Mark that a correction is being applied at `now`.
    pub fn begin_correction(&mut self, now: Instant) {
        self.suppressed_until = Some(now.checked_add(self.cooldown).unwrap_or(now));
    }

    /// Whether a correction cooldown is active at `now`.
    #[must_use]
    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// Ask to send a report at `now`. Records the emission when allowed.
    pub fn try_emit(&mut self, now: Instant) -> bool {
        if self.is_suppressed(now) {
            return false;
        }
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }
        self.last_emit = Some(now);
        true
    }
}
