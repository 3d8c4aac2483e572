//! `ConnectionActor` - owns the write half of one WebSocket.
//!
//! Rooms never touch sockets. They hand events to the connection's handle,
//! which enqueues without waiting; the actor encodes each event and writes it
//! in arrival order. A slow client fills its own mailbox and loses events
//! instead of stalling the room that produced them.
//!
//! # Lifecycle
//!
//! 1. Spawned when the WebSocket upgrade completes
//! 2. Runs until the socket write fails, `close` is called, or its token is
//!    cancelled (client went away, or server shutdown)
//! 3. On cancellation it sends a close frame before exiting

use super::messages::ConnectionMessage;
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use sync_protocol::{codec, ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Outbound mailbox size. Sized for a burst of chat plus voice frames.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionActorHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    connection_id: ConnectionId,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionActorHandle {
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Queue an event for delivery without waiting.
    ///
    /// Returns `false` if the event was dropped (mailbox full or actor gone).
    pub fn deliver(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(ConnectionMessage::Send { event }) {
            Ok(()) => {
                self.mailbox.record_enqueue();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.mailbox.record_drop();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    target: "rs.actor.connection",
                    connection_id = %self.connection_id,
                    "Dropping event for closed connection"
                );
                false
            }
        }
    }

    /// Ask the actor to send a close frame and stop.
    pub fn close(&self, reason: impl Into<String>) {
        if self
            .sender
            .try_send(ConnectionMessage::Close {
                reason: reason.into(),
            })
            .is_err()
        {
            // Mailbox full or gone; cancellation still closes the socket
            self.cancel_token.cancel();
        }
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Events dropped because the mailbox was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.mailbox.messages_dropped()
    }
}

/// The `ConnectionActor` implementation, generic over the socket's write half.
pub struct ConnectionActor<S> {
    connection_id: ConnectionId,
    receiver: mpsc::Receiver<ConnectionMessage>,
    cancel_token: CancellationToken,
    sink: S,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl<S> ConnectionActor<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    /// Spawn a connection actor writing to `sink`.
    pub fn spawn(
        connection_id: ConnectionId,
        sink: S,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (ConnectionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Connection,
            connection_id.as_str(),
        ));

        metrics.connection_opened();

        let actor = Self {
            connection_id: connection_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            sink,
            metrics,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionActorHandle {
            sender,
            cancel_token,
            connection_id,
            mailbox,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "rs.actor.connection", fields(connection_id = %self.connection_id))]
    async fn run(mut self) {
        debug!(
            target: "rs.actor.connection",
            connection_id = %self.connection_id,
            "ConnectionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    self.send_close(close_code::AWAY, "server closing connection").await;
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        break;
                    };
                    self.mailbox.record_dequeue();
                    self.metrics.record_message_processed();

                    match message {
                        ConnectionMessage::Send { event } => {
                            if !self.write_event(&event).await {
                                break;
                            }
                        }
                        ConnectionMessage::Close { reason } => {
                            self.send_close(close_code::NORMAL, &reason).await;
                            break;
                        }
                    }
                }
            }
        }

        self.metrics.connection_closed();

        debug!(
            target: "rs.actor.connection",
            connection_id = %self.connection_id,
            messages_processed = self.mailbox.messages_processed(),
            messages_dropped = self.mailbox.messages_dropped(),
            "ConnectionActor stopped"
        );
    }

    /// Returns `false` if the socket is gone.
    async fn write_event(&mut self, event: &ServerEvent) -> bool {
        let frame = match codec::encode_server_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    target: "rs.actor.connection",
                    connection_id = %self.connection_id,
                    event = event.name(),
                    error = %e,
                    "Failed to encode outbound event"
                );
                return true;
            }
        };

        match self.sink.send(Message::Text(frame)).await {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    target: "rs.actor.connection",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Socket write failed"
                );
                false
            }
        }
    }

    async fn send_close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        // The peer may already be gone
        let _ = self.sink.send(Message::Close(Some(frame))).await;
    }
}
