//! Drift correction tunables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Drift (seconds) above which the local player seeks.
pub const DEFAULT_SYNC_THRESHOLD_SECONDS: f64 = 0.8;

/// Extra lead (seconds) added to a peer's position to cover decode/seek time.
pub const DEFAULT_SYNC_BUFFER_SECONDS: f64 = 0.3;

/// Window during which outbound reports are suppressed after a correction,
/// and the minimum spacing between any two outbound reports.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// Tunables for [`crate::reconcile`] and [`crate::SyncGovernor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncTuning {
    pub sync_threshold: f64,
    pub sync_buffer: f64,
    pub cooldown: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            sync_threshold: DEFAULT_SYNC_THRESHOLD_SECONDS,
            sync_buffer: DEFAULT_SYNC_BUFFER_SECONDS,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}
