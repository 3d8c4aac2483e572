//! `RegistryActor` - singleton owner of the room code space.
//!
//! - Mints room codes and spawns one `RoomActor` per room
//! - Resolves codes to room handles
//! - Removes rooms when they empty, expire, or the service shuts down
//! - Monitors room actor health (panic detection via `JoinHandle`)
//!
//! # Graceful Shutdown
//!
//! On shutdown the registry stops creating rooms, cancels its root token
//! (propagating to every room) and waits for room tasks to finish.

use crate::config::RoomLimits;
use crate::errors::RoomError;
use crate::observability::metrics;
use crate::router::BroadcastRouter;

use super::messages::{EvictionReason, RegistryMessage, RegistryStatus, SweepReport};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle};

use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_protocol::types::ROOM_CODE_LENGTH;
use sync_protocol::RoomCode;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Attempts at minting an unused code before giving up.
const MAX_CODE_COLLISION_RETRIES: usize = 8;

const ROOM_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above it are discarded to keep the distribution uniform.
const UNBIASED_BYTE_LIMIT: u8 = 252;

/// Registry sizing.
#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    pub max_rooms: usize,
    pub room_limits: RoomLimits,
}

/// Handle to the `RegistryActor`.
#[derive(Clone)]
pub struct RegistryActorHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RegistryActorHandle {
    /// Spawn the registry and return a handle to it.
    #[must_use]
    pub fn new(
        settings: RegistrySettings,
        router: Arc<BroadcastRouter>,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RegistryActor {
            receiver,
            cancel_token: cancel_token.clone(),
            rooms: HashMap::new(),
            accepting_new: true,
            settings,
            router,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Registry, "registry"),
            rng: SystemRandom::new(),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Create a room with a fresh code.
    pub async fn create_room(&self) -> Result<RoomCode, RoomError> {
        self.request(|respond_to| RegistryMessage::CreateRoom { respond_to })
            .await?
    }

    /// Look up a live room.
    pub async fn get_room(&self, code: RoomCode) -> Result<RoomActorHandle, RoomError> {
        self.request(|respond_to| RegistryMessage::GetRoom { code, respond_to })
            .await?
    }

    /// Remove a room. Returns `false` if it was already gone.
    pub async fn remove_room(
        &self,
        code: RoomCode,
        reason: EvictionReason,
    ) -> Result<bool, RoomError> {
        self.request(|respond_to| RegistryMessage::RemoveRoom {
            code,
            reason,
            respond_to,
        })
        .await
    }

    /// Evict empty rooms and rooms older than `max_age`.
    pub async fn sweep(&self, now_ms: i64, max_age: Duration) -> Result<SweepReport, RoomError> {
        self.request(|respond_to| RegistryMessage::Sweep {
            now_ms,
            max_age,
            respond_to,
        })
        .await
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomActorHandle>, RoomError> {
        self.request(|respond_to| RegistryMessage::ListRooms { respond_to })
            .await
    }

    pub async fn get_status(&self) -> Result<RegistryStatus, RoomError> {
        self.request(|respond_to| RegistryMessage::GetStatus { respond_to })
            .await
    }

    /// Initiate graceful shutdown.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RegistryMessage::Shutdown { respond_to })
            .await?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for tasks that should stop with the registry.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    handle: RoomActorHandle,
    task_handle: JoinHandle<()>,
    /// Milliseconds since the Unix epoch.
    created_at: i64,
    /// Member count, written by the room actor.
    occupancy: Arc<AtomicUsize>,
}

/// The `RegistryActor` implementation.
pub struct RegistryActor {
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    rooms: HashMap<RoomCode, ManagedRoom>,
    accepting_new: bool,
    settings: RegistrySettings,
    router: Arc<BroadcastRouter>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
    rng: SystemRandom,
}

impl RegistryActor {
    #[instrument(skip_all, name = "rs.actor.registry")]
    async fn run(mut self) {
        info!(target: "rs.actor.registry", "RegistryActor started");

        loop {
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rs.actor.registry",
                        "RegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rs.actor.registry",
                                "RegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rs.actor.registry",
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RegistryActor stopped"
        );
    }

    fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::CreateRoom { respond_to } => {
                let _ = respond_to.send(self.create_room());
            }

            RegistryMessage::GetRoom { code, respond_to } => {
                let result = self
                    .rooms
                    .get(&code)
                    .map(|managed| managed.handle.clone())
                    .ok_or_else(|| RoomError::RoomNotFound(code.to_string()));
                let _ = respond_to.send(result);
            }

            RegistryMessage::RemoveRoom {
                code,
                reason,
                respond_to,
            } => {
                let _ = respond_to.send(self.remove_room(&code, reason));
            }

            RegistryMessage::Sweep {
                now_ms,
                max_age,
                respond_to,
            } => {
                let _ = respond_to.send(self.sweep(now_ms, max_age));
            }

            RegistryMessage::ListRooms { respond_to } => {
                let handles = self.rooms.values().map(|m| m.handle.clone()).collect();
                let _ = respond_to.send(handles);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::Shutdown { respond_to } => {
                info!(
                    target: "rs.actor.registry",
                    room_count = self.rooms.len(),
                    "Initiating graceful shutdown"
                );
                self.accepting_new = false;
                self.cancel_token.cancel();
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    fn create_room(&mut self) -> Result<RoomCode, RoomError> {
        if !self.accepting_new {
            metrics::record_room_created("draining");
            return Err(RoomError::Draining);
        }
        if self.rooms.len() >= self.settings.max_rooms {
            metrics::record_room_created("capacity");
            warn!(
                target: "rs.actor.registry",
                max_rooms = self.settings.max_rooms,
                "Room limit reached, rejecting create"
            );
            return Err(RoomError::CapacityExceeded);
        }

        let code = self.mint_code()?;
        let occupancy = Arc::new(AtomicUsize::new(0));
        let created_at = chrono::Utc::now().timestamp_millis();

        let (handle, task_handle) = RoomActor::spawn(
            code.clone(),
            created_at,
            self.settings.room_limits,
            Arc::clone(&self.router),
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
            Arc::clone(&occupancy),
        );

        self.rooms.insert(
            code.clone(),
            ManagedRoom {
                handle,
                task_handle,
                created_at,
                occupancy,
            },
        );

        self.metrics.room_created();
        metrics::record_room_created("success");

        info!(
            target: "rs.actor.registry",
            room_id = %code,
            total_rooms = self.rooms.len(),
            "Room created"
        );

        Ok(code)
    }

    /// Draw codes until one is unused.
    fn mint_code(&self) -> Result<RoomCode, RoomError> {
        for _ in 0..MAX_CODE_COLLISION_RETRIES {
            let code = generate_room_code(&self.rng)?;
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            debug!(target: "rs.actor.registry", room_id = %code, "Room code collision, retrying");
        }
        metrics::record_room_created("error");
        Err(RoomError::Internal(
            "exhausted room code retries".to_string(),
        ))
    }

    /// Idempotent: returns `false` if the room was already gone.
    fn remove_room(&mut self, code: &RoomCode, reason: EvictionReason) -> bool {
        let Some(managed) = self.rooms.remove(code) else {
            return false;
        };

        managed.handle.cancel();

        // Wait for cleanup off the message loop
        let room_id = code.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(Duration::from_secs(5), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rs.actor.registry",
                        room_id = %room_id,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rs.actor.registry",
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rs.actor.registry",
                        room_id = %room_id,
                        "Room actor task cleanup timed out"
                    );
                }
            }
        });

        self.metrics.room_removed();
        metrics::record_room_eviction(reason.as_str());

        info!(
            target: "rs.actor.registry",
            room_id = %code,
            reason = reason.as_str(),
            total_rooms = self.rooms.len(),
            "Room removed"
        );

        true
    }

    fn sweep(&mut self, now_ms: i64, max_age: Duration) -> SweepReport {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);

        let doomed: Vec<(RoomCode, EvictionReason)> = self
            .rooms
            .iter()
            .filter_map(|(code, managed)| {
                if managed.occupancy.load(Ordering::Relaxed) == 0 {
                    Some((code.clone(), EvictionReason::Empty))
                } else if now_ms.saturating_sub(managed.created_at) > max_age_ms {
                    Some((code.clone(), EvictionReason::Expired))
                } else {
                    None
                }
            })
            .collect();

        let mut report = SweepReport::default();
        for (code, reason) in doomed {
            if self.remove_room(&code, reason) {
                match reason {
                    EvictionReason::Expired => report.evicted_expired += 1,
                    _ => report.evicted_empty += 1,
                }
            }
        }
        report.remaining = self.rooms.len();
        report
    }

    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            room_count: self.rooms.len(),
            connection_count: self.router.connection_count(),
            participant_count: self.metrics.participant_count(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    async fn graceful_shutdown(&mut self) {
        info!(
            target: "rs.actor.registry",
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        for managed in self.rooms.values() {
            managed.handle.cancel();
        }

        for (code, managed) in self.rooms.drain() {
            match tokio::time::timeout(Duration::from_secs(30), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rs.actor.registry",
                        room_id = %code,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rs.actor.registry",
                        room_id = %code,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rs.actor.registry",
                        room_id = %code,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
            metrics::record_room_eviction(EvictionReason::Shutdown.as_str());
        }

        info!(target: "rs.actor.registry", "Graceful shutdown complete");
    }

    /// Drop rooms whose actor task ended on its own.
    async fn check_room_health(&mut self) {
        let finished: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(code, _)| code.clone())
            .collect();

        for code in finished {
            let Some(managed) = self.rooms.remove(&code) else {
                continue;
            };
            warn!(
                target: "rs.actor.registry",
                room_id = %code,
                "Room actor task finished unexpectedly"
            );

            if let Err(join_error) = managed.task_handle.await {
                if join_error.is_panic() {
                    error!(
                        target: "rs.actor.registry",
                        room_id = %code,
                        error = ?join_error,
                        "Room actor panicked - triggering investigation"
                    );
                    self.metrics.record_panic(ActorType::Room);
                }
            }

            // Members of a crashed room would otherwise stay bound to it
            for _ in self.router.unbind_room(&code) {
                self.metrics.participant_left();
            }
            self.metrics.room_removed();
        }
    }
}

/// Draw a uniformly random room code.
///
/// # Errors
///
/// Returns `RoomError::Internal` if the system RNG fails.
pub fn generate_room_code(rng: &dyn SecureRandom) -> Result<RoomCode, RoomError> {
    let mut code = String::with_capacity(ROOM_CODE_LENGTH);
    let mut buf = [0u8; 16];

    while code.len() < ROOM_CODE_LENGTH {
        rng.fill(&mut buf)
            .map_err(|_| RoomError::Internal("system RNG failure".to_string()))?;
        for byte in buf {
            if byte >= UNBIASED_BYTE_LIMIT {
                continue;
            }
            if let Some(&c) = ROOM_CODE_ALPHABET.get(usize::from(byte) % ROOM_CODE_ALPHABET.len()) {
                code.push(char::from(c));
            }
            if code.len() == ROOM_CODE_LENGTH {
                break;
            }
        }
    }

    RoomCode::parse(&code).map_err(|e| RoomError::Internal(format!("generated bad code: {e}")))
}
