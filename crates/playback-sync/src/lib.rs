//! Playback drift correction for watch-room participants.
//!
//! Each participant runs this locally. When a peer's playback report arrives,
//! [`reconcile`] decides whether the local player should seek, play or pause.
//! [`SyncGovernor`] keeps a correction from bouncing straight back out as a
//! new report, and rate-limits outbound reports in general. [`SyncSession`]
//! ties both to a concrete player via [`PlayerControl`].
//!
//! ```text
//! peer report ──► reconcile ──► Correction ──► PlayerControl
//!                                   │
//!                                   └─► SyncGovernor (suppress echo)
//! local player event ──► SyncGovernor ──► video-sync report
//! ```

#![warn(clippy::pedantic)]

pub mod governor;
pub mod reconciler;
pub mod session;
pub mod tuning;

pub use governor::SyncGovernor;
pub use reconciler::{reconcile, Correction, LocalPlayback, PlaybackReport, Transport};
pub use session::{PlayerControl, SyncSession};
pub use tuning::SyncTuning;
