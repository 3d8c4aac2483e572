//! WebSocket endpoint.
//!
//! Each upgraded socket is split: the write half goes to a
//! [`ConnectionActor`], the read half stays in this task and feeds a
//! [`Session`]. Client frames are JSON text; binary frames are ignored.
//!
//! When the read half ends (close frame, error, or server shutdown) the
//! session leaves its room before the connection is forgotten.

use crate::actors::{ActorMetrics, ConnectionActor, RegistryActorHandle};
use crate::errors::RoomError;
use crate::router::BroadcastRouter;
use crate::routes::AppState;
use crate::session::Session;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use std::sync::Arc;
use sync_protocol::ConnectionId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Everything a socket needs from the service.
#[derive(Clone)]
pub struct WsContext {
    pub registry: RegistryActorHandle,
    pub router: Arc<BroadcastRouter>,
    pub metrics: Arc<ActorMetrics>,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

impl WsContext {
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self {
            registry: state.registry.clone(),
            router: Arc::clone(&state.router),
            metrics: Arc::clone(&state.metrics),
            shutdown: state.shutdown.clone(),
        }
    }
}

/// Handler for `GET /ws`. Refuses new sockets once shutdown has begun.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if !state.health.is_ready() {
        return RoomError::Draining.into_response();
    }
    let ctx = WsContext::from_state(&state);
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// Drive one upgraded socket until it closes.
#[instrument(skip_all, name = "rs.ws", fields(connection_id = tracing::field::Empty))]
pub async fn handle_socket(socket: WebSocket, ctx: WsContext) {
    let connection_id = ConnectionId::generate();
    tracing::Span::current().record("connection_id", connection_id.as_str());

    let (sink, mut stream) = socket.split();
    let cancel_token = ctx.shutdown.child_token();
    let (handle, writer) = ConnectionActor::spawn(
        connection_id.clone(),
        sink,
        cancel_token.clone(),
        Arc::clone(&ctx.metrics),
    );
    ctx.router.register(handle);

    info!(target: "rs.ws", connection_id = %connection_id, "Client connected");

    let mut session = Session::new(
        connection_id.clone(),
        ctx.registry.clone(),
        Arc::clone(&ctx.router),
    );

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_frame(&text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(
                            target: "rs.ws",
                            connection_id = %connection_id,
                            error = %e,
                            "Socket read failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    session.disconnect().await;
    ctx.router.deregister(&connection_id);
    cancel_token.cancel();
    let _ = writer.await;

    info!(target: "rs.ws", connection_id = %connection_id, "Client disconnected");
}
