//! End-to-end room flow tests.
//!
//! Each test spawns the real service on a random port and drives it with
//! WebSocket clients.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use room_test_utils::{TestRoomServer, TestWsClient};
use std::time::Duration;
use sync_protocol::{ClientEvent, RoomCode, ServerEvent};

const QUIET: Duration = Duration::from_millis(200);

fn code(room_id: &str) -> RoomCode {
    RoomCode::parse(room_id).unwrap()
}

async fn expect_error(client: &mut TestWsClient, expected: &str) -> Result<()> {
    let ServerEvent::Error { code, .. } = client.next_event().await? else {
        unreachable!("expected error event");
    };
    assert_eq!(code, expected);
    Ok(())
}

#[tokio::test]
async fn test_join_sends_snapshot_and_announces_to_peers() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;

    let (mut alex, snapshot) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let ServerEvent::RoomJoined {
        room_id: joined_room,
        users,
        messages,
        is_host,
        ..
    } = snapshot
    else {
        unreachable!("join returns room-joined");
    };
    assert_eq!(joined_room.as_str(), room_id);
    assert!(is_host, "first participant becomes host");
    assert_eq!(users.len(), 1);
    assert!(messages.is_empty());

    let (_sam, snapshot) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    let ServerEvent::RoomJoined { users, is_host, .. } = snapshot else {
        unreachable!("join returns room-joined");
    };
    assert!(!is_host);
    assert_eq!(users.len(), 2);

    let ServerEvent::UserJoined {
        username,
        user_count,
        is_host,
        ..
    } = alex.next_event().await?
    else {
        unreachable!("existing member sees user-joined");
    };
    assert_eq!(username, "sam");
    assert_eq!(user_count, 2);
    assert!(!is_host);

    Ok(())
}

#[tokio::test]
async fn test_join_is_case_insensitive() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;

    let mut alex = TestWsClient::connect(&server.ws_url()).await?;
    alex.send_raw(format!(
        r#"{{"type":"join-room","roomId":"{}","username":"alex"}}"#,
        room_id.to_lowercase()
    ))
    .await?;
    let ServerEvent::RoomJoined { room_id: joined, .. } = alex.next_event().await? else {
        unreachable!("join returns room-joined");
    };
    assert_eq!(joined.as_str(), room_id);

    Ok(())
}

#[tokio::test]
async fn test_join_unknown_room_is_rejected() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let mut client = TestWsClient::connect(&server.ws_url()).await?;

    client
        .send(&ClientEvent::JoinRoom {
            room_id: code("ZZZZ9999"),
            username: "alex".to_string(),
        })
        .await?;
    expect_error(&mut client, "ROOM_NOT_FOUND").await
}

#[tokio::test]
async fn test_join_with_blank_name_is_rejected() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;
    let mut client = TestWsClient::connect(&server.ws_url()).await?;

    client
        .send(&ClientEvent::JoinRoom {
            room_id: code(&room_id),
            username: "   ".to_string(),
        })
        .await?;
    expect_error(&mut client, "VALIDATION_ERROR").await
}

#[tokio::test]
async fn test_host_departure_promotes_next_member() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;

    let (alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let (mut sam, _) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    let (mut kim, _) = TestWsClient::join(&server.ws_url(), &room_id, "kim").await?;
    sam.next_named("user-joined").await?;

    alex.close().await?;

    let ServerEvent::UserLeft {
        username,
        user_count,
        was_host,
        ..
    } = sam.next_event().await?
    else {
        unreachable!("user-left comes first");
    };
    assert_eq!(username, "alex");
    assert_eq!(user_count, 2);
    assert!(was_host);

    let ServerEvent::HostChanged { new_host, .. } = sam.next_event().await? else {
        unreachable!("host-changed follows user-left");
    };
    assert_eq!(new_host, "sam");

    let ServerEvent::BecameHost { message } = sam.next_event().await? else {
        unreachable!("promoted member is told directly");
    };
    assert!(!message.is_empty());

    assert!(matches!(kim.next_event().await?, ServerEvent::UserLeft { .. }));
    assert!(matches!(
        kim.next_event().await?,
        ServerEvent::HostChanged { .. }
    ));
    kim.expect_quiet(QUIET).await?;

    Ok(())
}

#[tokio::test]
async fn test_chat_reaches_everyone_and_joins_the_snapshot() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;

    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let (mut sam, _) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    alex.next_named("user-joined").await?;

    sam.send(&ClientEvent::SendMessage {
        room_id: code(&room_id),
        message: "  hello  ".to_string(),
    })
    .await?;

    for client in [&mut alex, &mut sam] {
        let ServerEvent::NewMessage(message) = client.next_event().await? else {
            unreachable!("chat is echoed to the whole room");
        };
        assert_eq!(message.username, "sam");
        assert_eq!(message.message, "hello");
    }

    let (_kim, snapshot) = TestWsClient::join(&server.ws_url(), &room_id, "kim").await?;
    let ServerEvent::RoomJoined { messages, .. } = snapshot else {
        unreachable!("join returns room-joined");
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.first().map(|m| m.message.as_str()), Some("hello"));

    Ok(())
}

#[tokio::test]
async fn test_empty_chat_message_is_rejected() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;
    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;

    alex.send(&ClientEvent::SendMessage {
        room_id: code(&room_id),
        message: "   ".to_string(),
    })
    .await?;
    expect_error(&mut alex, "VALIDATION_ERROR").await
}

#[tokio::test]
async fn test_actions_outside_a_joined_room_are_rejected() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;
    let mut client = TestWsClient::connect(&server.ws_url()).await?;

    client
        .send(&ClientEvent::SendMessage {
            room_id: code(&room_id),
            message: "hi".to_string(),
        })
        .await?;
    expect_error(&mut client, "NOT_IN_ROOM").await?;

    client
        .send(&ClientEvent::VideoChange {
            room_id: code(&room_id),
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        })
        .await?;
    expect_error(&mut client, "NOT_IN_ROOM").await
}

#[tokio::test]
async fn test_video_change_then_sync_then_request() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;

    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let (mut sam, _) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    alex.next_named("user-joined").await?;

    alex.send(&ClientEvent::VideoChange {
        room_id: code(&room_id),
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
    })
    .await?;

    for client in [&mut alex, &mut sam] {
        let ServerEvent::VideoChanged { username, .. } = client.next_event().await? else {
            unreachable!("video change goes to the whole room");
        };
        assert_eq!(username, "alex");
    }

    sam.send(&ClientEvent::VideoSync {
        room_id: code(&room_id),
        url: None,
        current_time: Some(42.0),
        is_playing: Some(true),
        duration: None,
    })
    .await?;

    let ServerEvent::VideoSynced {
        url,
        current_time,
        is_playing,
        ..
    } = alex.next_event().await?
    else {
        unreachable!("peers receive video-synced");
    };
    assert!(url.is_some(), "partial sync keeps the current url");
    assert!((current_time - 42.0).abs() < f64::EPSILON);
    assert!(is_playing);
    sam.expect_quiet(QUIET).await?;

    let (mut kim, snapshot) = TestWsClient::join(&server.ws_url(), &room_id, "kim").await?;
    let ServerEvent::RoomJoined { video, .. } = snapshot else {
        unreachable!("join returns room-joined");
    };
    assert!(video.is_playing);

    kim.send(&ClientEvent::RequestSync {
        room_id: code(&room_id),
    })
    .await?;
    let ServerEvent::VideoSynced { current_time, .. } = kim.next_event().await? else {
        unreachable!("request-sync answers the requester");
    };
    assert!((current_time - 42.0).abs() < f64::EPSILON);

    Ok(())
}

#[tokio::test]
async fn test_video_change_with_bad_url_is_rejected() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;
    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let (mut sam, _) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    alex.next_named("user-joined").await?;

    alex.send(&ClientEvent::VideoChange {
        room_id: code(&room_id),
        url: "not a url".to_string(),
    })
    .await?;
    expect_error(&mut alex, "INVALID_URL").await?;
    sam.expect_quiet(QUIET).await?;

    Ok(())
}

#[tokio::test]
async fn test_voice_is_relayed_only_when_enabled_and_unmuted() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;

    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let (mut sam, _) = TestWsClient::join(&server.ws_url(), &room_id, "sam").await?;
    alex.next_named("user-joined").await?;

    let voice = |audio: &str| ClientEvent::VoiceData {
        room_id: code(&room_id),
        audio_data: audio.to_string(),
        timestamp: Some(1_000),
    };

    // Host starts unmuted but with voice disabled
    alex.send(&voice("dropped")).await?;
    sam.expect_quiet(QUIET).await?;

    alex.send(&ClientEvent::VoiceStatus {
        room_id: code(&room_id),
        is_muted: None,
        is_voice_enabled: Some(true),
    })
    .await?;
    let ServerEvent::VoiceStatusUpdate {
        username,
        is_muted,
        is_voice_enabled,
        ..
    } = sam.next_event().await?
    else {
        unreachable!("peers see voice-status-update");
    };
    assert_eq!(username, "alex");
    assert!(!is_muted);
    assert!(is_voice_enabled);

    alex.send(&voice("chunk")).await?;
    let ServerEvent::VoiceData {
        audio_data,
        username,
        timestamp,
        ..
    } = sam.next_event().await?
    else {
        unreachable!("enabled, unmuted voice is relayed");
    };
    assert_eq!(audio_data, "chunk");
    assert_eq!(username, "alex");
    assert_eq!(timestamp, 1_000);
    alex.expect_quiet(QUIET).await?;

    // Non-hosts join muted
    sam.send(&voice("muted")).await?;
    alex.expect_quiet(QUIET).await?;

    Ok(())
}

#[tokio::test]
async fn test_ping_and_malformed_frames() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let mut client = TestWsClient::connect(&server.ws_url()).await?;

    client.send(&ClientEvent::Ping { timestamp: None }).await?;
    let ServerEvent::Pong { timestamp } = client.next_event().await? else {
        unreachable!("ping is answered with pong");
    };
    assert!(timestamp > 0);

    client.send_raw("{\"type\":\"dance\"}".to_string()).await?;
    expect_error(&mut client, "INVALID_MESSAGE").await?;

    // Connection survives a bad frame
    client.send(&ClientEvent::Ping { timestamp: None }).await?;
    assert!(matches!(
        client.next_event().await?,
        ServerEvent::Pong { .. }
    ));

    Ok(())
}

#[tokio::test]
async fn test_last_member_leaving_removes_the_room() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let room_id = server.create_room().await?;
    let path = format!("/api/room/{room_id}");

    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &room_id, "alex").await?;
    let (status, body) = server.get_json(&path).await?;
    assert_eq!(status, 200);
    assert_eq!(body["userCount"], 1);

    alex.send(&ClientEvent::LeaveRoom).await?;
    alex.expect_quiet(QUIET).await?;

    let mut status = 0;
    for _ in 0..20 {
        (status, _) = server.get_json(&path).await?;
        if status == 404 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(status, 404);

    alex.send(&ClientEvent::JoinRoom {
        room_id: code(&room_id),
        username: "alex".to_string(),
    })
    .await?;
    expect_error(&mut alex, "ROOM_NOT_FOUND").await
}

#[tokio::test]
async fn test_stats_reflect_live_rooms() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let first = server.create_room().await?;
    let _second = server.create_room().await?;

    let (mut alex, _) = TestWsClient::join(&server.ws_url(), &first, "alex").await?;
    let (_sam, _) = TestWsClient::join(&server.ws_url(), &first, "sam").await?;
    alex.next_named("user-joined").await?;

    alex.send(&ClientEvent::VideoChange {
        room_id: code(&first),
        url: "https://vimeo.com/76979871".to_string(),
    })
    .await?;
    alex.next_named("video-changed").await?;

    let (status, body) = server.get_json("/api/stats").await?;
    assert_eq!(status, 200);
    assert_eq!(body["activeRooms"], 2);
    assert_eq!(body["totalUsers"], 2);
    assert_eq!(body["totalHosts"], 1);
    assert_eq!(body["roomsWithVideo"], 1);

    Ok(())
}
