//! WebSocket test client speaking the room protocol.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use sync_protocol::{codec, ClientEvent, RoomCode, ServerEvent};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// How long `next_event` waits before failing the test.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// One connected client.
pub struct TestWsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;
        Ok(Self { stream })
    }

    /// Connect and join `room_id`, returning the `room-joined` snapshot.
    pub async fn join(
        url: &str,
        room_id: &str,
        username: &str,
    ) -> Result<(Self, ServerEvent), anyhow::Error> {
        let mut client = Self::connect(url).await?;
        client
            .send(&ClientEvent::JoinRoom {
                room_id: RoomCode::parse(room_id)?,
                username: username.to_string(),
            })
            .await?;
        let snapshot = client.next_event().await?;
        if !matches!(snapshot, ServerEvent::RoomJoined { .. }) {
            anyhow::bail!("expected room-joined, got {snapshot:?}");
        }
        Ok((client, snapshot))
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), anyhow::Error> {
        let frame = codec::encode_client_event(event)?;
        self.send_raw(frame).await
    }

    /// Send a text frame as-is.
    pub async fn send_raw(&mut self, frame: String) -> Result<(), anyhow::Error> {
        self.stream.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Next server event, skipping control frames.
    pub async fn next_event(&mut self) -> Result<ServerEvent, anyhow::Error> {
        loop {
            let frame = tokio::time::timeout(EVENT_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for server event"))?;
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(codec::decode_server_event(&text)?),
                Some(Ok(Message::Close(frame))) => {
                    anyhow::bail!("connection closed: {frame:?}")
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => anyhow::bail!("connection ended"),
            }
        }
    }

    /// Next event, skipping any that do not carry the wanted event name.
    pub async fn next_named(&mut self, name: &str) -> Result<ServerEvent, anyhow::Error> {
        loop {
            let event = self.next_event().await?;
            if event.name() == name {
                return Ok(event);
            }
        }
    }

    /// Fail if any event arrives within `wait`.
    pub async fn expect_quiet(&mut self, wait: Duration) -> Result<(), anyhow::Error> {
        match tokio::time::timeout(wait, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => anyhow::bail!("unexpected event: {text}"),
            Ok(other) => anyhow::bail!("unexpected frame: {other:?}"),
        }
    }

    /// Send a close frame and wait for the server to finish.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.stream.close(None).await?;
        while let Some(Ok(_)) = self.stream.next().await {}
        Ok(())
    }
}
