//! Connection registry for room membership and fan-out.
//!
//! The registry maintains a bidirectional association: room → members (for
//! broadcast) and connection → member record (identity, room, outbound half)
//! for lookup and cleanup. Both maps live behind one lock so they can never
//! disagree.
//!
//! Rooms are created lazily on first connect and pruned the moment their last
//! member leaves. Broadcast snapshots the member list under a brief read lock
//! and performs delivery after releasing it, so a slow receiver only ever
//! delays the broadcast it is part of.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::future::join_all;
use roomcast_core::{ConnectionId, Environment, Identity, RoomName};

use crate::{
    connection::Outbound,
    error::{DeliveryError, RegistryError},
};

/// Default time a single recipient has to accept a broadcast message.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-recipient delivery timeout
    pub send_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { send_timeout: DEFAULT_SEND_TIMEOUT }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Members the message was addressed to (the snapshot, minus the sender)
    pub recipients: usize,
    /// Per-recipient failures
    pub failures: Vec<DeliveryError>,
}

impl BroadcastReport {
    /// Number of recipients that accepted the message.
    pub fn delivered(&self) -> usize {
        self.recipients - self.failures.len()
    }

    /// True if every recipient accepted the message.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Point-in-time view of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStats {
    /// Room name
    pub room: RoomName,
    /// Current member count
    pub members: usize,
}

/// Registry record for one connected member.
struct Member {
    room: RoomName,
    identity: Identity,
    outbound: Arc<dyn Outbound>,
}

#[derive(Default)]
struct RegistryState {
    /// Room → member connection IDs. Never holds an empty set.
    rooms: HashMap<RoomName, HashSet<ConnectionId>>,
    /// Connection → member record. Present iff the connection is in a room.
    members: HashMap<ConnectionId, Member>,
}

/// Registry of room memberships.
///
/// Constructed once at startup and shared (`Arc`) with every session. All
/// mutation of room membership goes through [`RoomRegistry::connect`] and
/// [`RoomRegistry::disconnect`].
pub struct RoomRegistry<E: Environment> {
    env: E,
    config: RegistryConfig,
    next_connection_id: AtomicU64,
    state: RwLock<RegistryState>,
}

impl<E: Environment> RoomRegistry<E> {
    /// Create an empty registry.
    pub fn new(env: E, config: RegistryConfig) -> Self {
        Self {
            env,
            config,
            next_connection_id: AtomicU64::new(1),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a fresh connection ID. Never returns the same ID twice.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `connection_id` as a member of `room`, creating the room if
    /// needed.
    ///
    /// Returns the freshly generated identity.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyConnected` if the connection is already a
    ///   member of any room
    pub fn connect(
        &self,
        connection_id: ConnectionId,
        room: &RoomName,
        outbound: Arc<dyn Outbound>,
    ) -> Result<Identity, RegistryError> {
        let identity = Identity::generate(&self.env);

        {
            let mut guard = self.write();
            let state = &mut *guard;

            if let Some(existing) = state.members.get(&connection_id) {
                return Err(RegistryError::AlreadyConnected {
                    connection_id,
                    room: existing.room.clone(),
                });
            }

            state.rooms.entry(room.clone()).or_default().insert(connection_id);
            state.members.insert(
                connection_id,
                Member { room: room.clone(), identity: identity.clone(), outbound },
            );
        }

        tracing::debug!(%connection_id, %room, %identity, "connection joined room");

        Ok(identity)
    }

    /// Remove `connection_id` from `room` and discard its identity.
    ///
    /// Prunes the room if this was its last member. Returns the identity the
    /// connection had, or `None` if it was not a member of `room` (including
    /// a second disconnect of the same connection).
    pub fn disconnect(&self, connection_id: ConnectionId, room: &RoomName) -> Option<Identity> {
        let (member, room_pruned) = {
            let mut guard = self.write();
            let state = &mut *guard;

            if state.members.get(&connection_id).is_none_or(|m| &m.room != room) {
                return None;
            }

            let member = state.members.remove(&connection_id)?;

            let emptied = match state.rooms.get_mut(room) {
                Some(members) => {
                    members.remove(&connection_id);
                    members.is_empty()
                },
                None => false,
            };

            if emptied {
                state.rooms.remove(room);
            }

            (member, emptied)
        };

        tracing::debug!(
            %connection_id,
            %room,
            identity = %member.identity,
            room_pruned,
            "connection left room"
        );

        Some(member.identity)
    }

    /// Deliver `message` to every current member of `room` except `sender`.
    ///
    /// Membership is snapshotted first; delivery happens with no registry
    /// lock held, concurrently across recipients, each bounded by
    /// [`RegistryConfig::send_timeout`]. A failed recipient is reported in
    /// the returned [`BroadcastReport`] and does not stop the others.
    pub async fn broadcast(
        &self,
        message: &str,
        room: &RoomName,
        sender: ConnectionId,
    ) -> BroadcastReport {
        let recipients = self.snapshot_recipients(room, sender);
        let timeout = self.config.send_timeout;

        let deliveries = recipients.iter().map(|(connection_id, outbound)| async move {
            match tokio::time::timeout(timeout, outbound.send_text(message)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(DeliveryError::DisconnectedDuringSend {
                    connection_id: *connection_id,
                    source,
                }),
                Err(_) => Err(DeliveryError::TimedOut { connection_id: *connection_id, timeout }),
            }
        });

        let failures: Vec<DeliveryError> =
            join_all(deliveries).await.into_iter().filter_map(Result::err).collect();

        BroadcastReport { recipients: recipients.len(), failures }
    }

    /// Identity of a connected member. `None` if not connected.
    pub fn identity(&self, connection_id: ConnectionId) -> Option<Identity> {
        self.read().members.get(&connection_id).map(|m| m.identity.clone())
    }

    /// Room a connection belongs to. `None` if not connected.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<RoomName> {
        self.read().members.get(&connection_id).map(|m| m.room.clone())
    }

    /// Current members of a room, in ascending ID order.
    pub fn members(&self, room: &RoomName) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> =
            self.read().rooms.get(room).map(|m| m.iter().copied().collect()).unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Check if a room currently exists (has at least one member).
    pub fn has_room(&self, room: &RoomName) -> bool {
        self.read().rooms.contains_key(room)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.read().rooms.len()
    }

    /// Number of connected members across all rooms.
    pub fn connection_count(&self) -> usize {
        self.read().members.len()
    }

    /// Snapshot of every room and its size, sorted by name.
    pub fn rooms(&self) -> Vec<RoomStats> {
        let mut rooms: Vec<RoomStats> = self
            .read()
            .rooms
            .iter()
            .map(|(room, members)| RoomStats { room: room.clone(), members: members.len() })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        rooms
    }

    /// Copy out the outbound halves of everyone in `room` but `sender`.
    fn snapshot_recipients(
        &self,
        room: &RoomName,
        sender: ConnectionId,
    ) -> Vec<(ConnectionId, Arc<dyn Outbound>)> {
        let state = self.read();

        let Some(members) = state.rooms.get(room) else {
            return Vec::new();
        };

        members
            .iter()
            .filter(|&&id| id != sender)
            .filter_map(|id| state.members.get(id).map(|m| (*id, Arc::clone(&m.outbound))))
            .collect()
    }

    // Every mutation finishes its map updates before anything can fail, so a
    // poisoned lock still guards consistent state.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
