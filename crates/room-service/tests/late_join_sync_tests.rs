//! Playback alignment for participants who arrive after the room went idle.
//!
//! A paused room keeps its position no matter how long ago it was last
//! touched, so a late joiner or a resync must not move a player that is
//! already paused at that position.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use playback_sync::{PlayerControl, SyncSession, SyncTuning};
use room_test_utils::{TestRoomServer, TestWsClient};
use std::time::{Duration, Instant};
use sync_protocol::{ClientEvent, RoomCode, ServerEvent};

#[derive(Debug)]
struct PausedPlayer {
    position: f64,
    playing: bool,
    seeks: usize,
}

impl PlayerControl for PausedPlayer {
    fn current_time(&self) -> f64 {
        self.position
    }
    fn is_playing(&self) -> bool {
        self.playing
    }
    fn seek(&mut self, seconds: f64) {
        self.position = seconds;
        self.seeks += 1;
    }
    fn play(&mut self) {
        self.playing = true;
    }
    fn pause(&mut self) {
        self.playing = false;
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[tokio::test]
async fn test_late_joiner_to_idle_paused_room_is_not_seeked() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;
    let code = RoomCode::parse(&room_id)?;

    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    alex.send(&ClientEvent::VideoChange {
        room_id: code.clone(),
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
    })
    .await?;
    alex.next_named("video-changed").await?;
    alex.send(&ClientEvent::VideoSync {
        room_id: code.clone(),
        url: None,
        current_time: Some(10.0),
        is_playing: Some(false),
        duration: None,
    })
    .await?;
    alex.send(&ClientEvent::Ping { timestamp: None }).await?;
    alex.next_named("pong").await?;

    // Idle for longer than the drift threshold
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let (mut sam, snapshot) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    let ServerEvent::RoomJoined { video, .. } = &snapshot else {
        unreachable!("join returns room-joined");
    };
    assert!(!video.is_playing);
    assert!((video.current_time - 10.0).abs() < f64::EPSILON);

    let mut session = SyncSession::new(code.clone(), SyncTuning::default());
    session.attach(PausedPlayer {
        position: 10.0,
        playing: false,
        seeks: 0,
    });

    let correction = session
        .handle_server_event(&snapshot, now_ms(), Instant::now())
        .unwrap();
    assert!(correction.seek_to.is_none(), "snapshot moved a paused player");

    sam.send(&session.resync_request()).await?;
    let synced = sam.next_named("video-synced").await?;
    let correction = session
        .handle_server_event(&synced, now_ms(), Instant::now())
        .unwrap();
    assert!(correction.seek_to.is_none(), "resync moved a paused player");

    let player = session.player().unwrap();
    assert_eq!(player.seeks, 0);
    assert!((player.position - 10.0).abs() < f64::EPSILON);
    assert!(!player.playing);

    Ok(())
}
