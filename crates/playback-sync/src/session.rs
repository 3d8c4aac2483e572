//! Player-facing sync session.

use crate::governor::SyncGovernor;
use crate::reconciler::{reconcile, Correction, LocalPlayback, PlaybackReport, Transport};
use crate::tuning::SyncTuning;
use std::time::Instant;
use sync_protocol::{ClientEvent, RoomCode, ServerEvent, VideoPatch};
use tracing::debug;

/// Control surface of a platform media player.
pub trait PlayerControl {
    /// Current position in seconds.
    fn current_time(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn seek(&mut self, seconds: f64);
    fn play(&mut self);
    fn pause(&mut self);
}

/// Keeps one local player in step with its room.
///
/// Reports that arrive before a player is attached are dropped, not queued:
/// by the time the player is ready a newer report or an explicit resync will
/// supersede them.
pub struct SyncSession<P> {
    room_id: RoomCode,
    tuning: SyncTuning,
    governor: SyncGovernor,
    player: Option<P>,
    live: bool,
}

impl<P: PlayerControl> SyncSession<P> {
    #[must_use]
    pub fn new(room_id: RoomCode, tuning: SyncTuning) -> Self {
        Self {
            room_id,
            tuning,
            governor: SyncGovernor::new(tuning.cooldown),
            player: None,
            live: false,
        }
    }

    /// Attach a player once it is ready to accept commands.
    pub fn attach(&mut self, player: P) {
        self.player = Some(player);
    }

    /// Detach the player, e.g. while the room switches video.
    pub fn detach(&mut self) -> Option<P> {
        self.player.take()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.player.is_some()
    }

    #[must_use]
    pub fn player(&self) -> Option<&P> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut P> {
        self.player.as_mut()
    }

    #[must_use]
    pub fn room_id(&self) -> &RoomCode {
        &self.room_id
    }

    /// Reconcile a peer report and drive the player.
    ///
    /// Returns `None` when no player is attached. Live sources have no
    /// seekable timeline, so only play/pause is applied to them.
    pub fn apply_remote(
        &mut self,
        report: &PlaybackReport,
        now_ms: i64,
        now: Instant,
    ) -> Option<Correction> {
        let Some(player) = self.player.as_mut() else {
            debug!(
                target: "sync.session",
                room_id = %self.room_id,
                "Player not ready, dropping playback report"
            );
            return None;
        };

        let local = LocalPlayback {
            current_time: player.current_time(),
            is_playing: player.is_playing(),
        };
        let mut correction = reconcile(report, &local, now_ms, &self.tuning);
        if self.live {
            correction.seek_to = None;
        }

        if correction.is_noop() {
            return Some(correction);
        }

        self.governor.begin_correction(now);

        if let Some(target) = correction.seek_to {
            debug!(
                target: "sync.session",
                room_id = %self.room_id,
                from = local.current_time,
                to = target,
                "Seeking to correct drift"
            );
            player.seek(target);
        }
        match correction.transport {
            Some(Transport::Play) => player.play(),
            Some(Transport::Pause) => player.pause(),
            None => {}
        }

        Some(correction)
    }

    /// Route a server event that concerns playback.
    ///
    /// `room-joined` and `video-synced` are reconciled; `video-changed`
    /// rewinds to the start, paused. Other events are ignored.
    pub fn handle_server_event(
        &mut self,
        event: &ServerEvent,
        now_ms: i64,
        now: Instant,
    ) -> Option<Correction> {
        match event {
            ServerEvent::RoomJoined {
                video, timestamp, ..
            } => {
                self.live = video.source.as_ref().is_some_and(|s| s.is_live());
                let report = PlaybackReport {
                    current_time: video.current_time,
                    is_playing: video.is_playing,
                    timestamp_ms: *timestamp,
                };
                self.apply_remote(&report, now_ms, now)
            }
            ServerEvent::VideoSynced {
                source,
                current_time,
                is_playing,
                timestamp,
                ..
            } => {
                self.live = source.as_ref().is_some_and(|s| s.is_live());
                let report = PlaybackReport {
                    current_time: *current_time,
                    is_playing: *is_playing,
                    timestamp_ms: *timestamp,
                };
                self.apply_remote(&report, now_ms, now)
            }
            ServerEvent::VideoChanged { source, .. } => {
                self.live = source.is_live();
                let player = self.player.as_mut()?;
                self.governor.begin_correction(now);
                player.pause();
                player.seek(0.0);
                Some(Correction {
                    seek_to: Some(0.0),
                    transport: Some(Transport::Pause),
                })
            }
            _ => None,
        }
    }

    /// Build a `video-sync` report from the local player, if the governor allows.
    ///
    /// Call on local play/pause/seek and on a periodic tick.
    pub fn local_report(&mut self, now: Instant) -> Option<ClientEvent> {
        let player = self.player.as_ref()?;
        let patch = VideoPatch {
            current_time: Some(player.current_time()),
            is_playing: Some(player.is_playing()),
            ..VideoPatch::default()
        };
        if !self.governor.try_emit(now) {
            return None;
        }
        Some(ClientEvent::video_sync(self.room_id.clone(), patch))
    }

    /// Ask the room for its authoritative video state.
    #[must_use]
    pub fn resync_request(&self) -> ClientEvent {
        ClientEvent::RequestSync {
            room_id: self.room_id.clone(),
        }
    }
}
