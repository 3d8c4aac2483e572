//! Connection registry and room fan-out.
//!
//! The router maps each live connection to its outbound handle and to the at
//! most one room it has joined. Room actors call `emit_*` to deliver events;
//! delivery is fire-and-forget and reaches only connections bound at the
//! moment of the call.
//!
//! Recipients are collected before any event is delivered so no map guard is
//! held across delivery.

use crate::actors::ConnectionActorHandle;
use crate::observability::metrics;
use dashmap::DashMap;
use std::collections::HashSet;
use sync_protocol::{ConnectionId, RoomCode, ServerEvent};
use tracing::{debug, trace};

/// Connection-to-room membership and event delivery.
#[derive(Debug, Default)]
pub struct BroadcastRouter {
    connections: DashMap<ConnectionId, ConnectionActorHandle>,
    membership: DashMap<ConnectionId, RoomCode>,
    rooms: DashMap<RoomCode, HashSet<ConnectionId>>,
}

impl BroadcastRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a connection reachable.
    pub fn register(&self, handle: ConnectionActorHandle) {
        let connection_id = handle.connection_id().clone();
        debug!(target: "rs.router", connection_id = %connection_id, "Connection registered");
        self.connections.insert(connection_id, handle);
    }

    /// Forget a connection. Any room binding is dropped as well; callers run
    /// the room leave first.
    pub fn deregister(&self, connection_id: &ConnectionId) {
        if let Some((_, room)) = self.membership.remove(connection_id) {
            self.remove_from_room(&room, connection_id);
        }
        self.connections.remove(connection_id);
        debug!(target: "rs.router", connection_id = %connection_id, "Connection deregistered");
    }

    /// Bind a connection to `room`, replacing any previous binding.
    pub fn bind(&self, connection_id: &ConnectionId, room: &RoomCode) {
        let previous = self
            .membership
            .insert(connection_id.clone(), room.clone());
        if let Some(previous) = previous.filter(|p| p != room) {
            self.remove_from_room(&previous, connection_id);
        }
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id.clone());
    }

    /// Unbind a connection if it is bound to `room`.
    pub fn unbind(&self, connection_id: &ConnectionId, room: &RoomCode) {
        let removed = self
            .membership
            .remove_if(connection_id, |_, bound| bound == room)
            .is_some();
        if removed {
            self.remove_from_room(room, connection_id);
        }
    }

    /// Unbind every member of `room`. Returns the connections that were bound.
    pub fn unbind_room(&self, room: &RoomCode) -> Vec<ConnectionId> {
        let members: Vec<ConnectionId> = self
            .rooms
            .remove(room)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();
        for connection_id in &members {
            self.membership
                .remove_if(connection_id, |_, bound| bound == room);
        }
        members
    }

    #[must_use]
    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<RoomCode> {
        self.membership
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn members(&self, room: &RoomCode) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver `event` to every connection bound to `room`, except `exclude`.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn emit_to_room(
        &self,
        room: &RoomCode,
        event: &ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let recipients: Vec<ConnectionActorHandle> = {
            let Some(members) = self.rooms.get(room) else {
                return 0;
            };
            let ids: Vec<ConnectionId> = members
                .iter()
                .filter(|id| Some(*id) != exclude)
                .cloned()
                .collect();
            drop(members);
            ids.iter()
                .filter_map(|id| self.connections.get(id).map(|h| h.value().clone()))
                .collect()
        };

        let delivered = recipients
            .iter()
            .filter(|handle| handle.deliver(event.clone()))
            .count();

        metrics::record_broadcast(event.name(), delivered);
        trace!(
            target: "rs.router",
            room_id = %room,
            event = event.name(),
            recipients = recipients.len(),
            delivered = delivered,
            "Room broadcast"
        );
        delivered
    }

    /// Deliver `event` to one connection. Returns `false` if it was dropped.
    pub fn emit_to_connection(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        let handle = self
            .connections
            .get(connection_id)
            .map(|h| h.value().clone());
        match handle {
            Some(handle) => handle.deliver(event),
            None => {
                trace!(
                    target: "rs.router",
                    connection_id = %connection_id,
                    event = event.name(),
                    "Event for unknown connection dropped"
                );
                false
            }
        }
    }

    fn remove_from_room(&self, room: &RoomCode, connection_id: &ConnectionId) {
        if let Some(mut set) = self.rooms.get_mut(room) {
            set.remove(connection_id);
        }
        self.rooms.remove_if(room, |_, set| set.is_empty());
    }
}
