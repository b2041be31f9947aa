//! Model registry state machine.

use std::collections::{BTreeMap, BTreeSet};

use super::operation::{ClientId, ModelRoomId};

/// Errors the model reports for rejected operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    /// Client already holds a connection.
    AlreadyConnected,
    /// Client holds no connection.
    NotConnected,
}

/// Reference room registry.
///
/// Each client holds at most one connection, and a connection lives in
/// exactly one room. Rooms exist only while they have members.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    /// Room of each connected client.
    connections: BTreeMap<ClientId, ModelRoomId>,
    /// Members of each non-empty room.
    rooms: BTreeMap<ModelRoomId, BTreeSet<ClientId>>,
}

impl ModelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `client` to `room`.
    pub fn connect(&mut self, client: ClientId, room: ModelRoomId) -> Result<(), ModelError> {
        if self.connections.contains_key(&client) {
            return Err(ModelError::AlreadyConnected);
        }

        self.connections.insert(client, room);
        self.rooms.entry(room).or_default().insert(client);
        Ok(())
    }

    /// Disconnect `client`, returning the room it left.
    pub fn disconnect(&mut self, client: ClientId) -> Result<ModelRoomId, ModelError> {
        let room = self.connections.remove(&client).ok_or(ModelError::NotConnected)?;

        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&client);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }

        Ok(room)
    }

    /// Recipients of a message sent by `client`: every other member of its
    /// room, in ascending order.
    pub fn broadcast(&self, client: ClientId) -> Result<Vec<ClientId>, ModelError> {
        let room = self.connections.get(&client).ok_or(ModelError::NotConnected)?;

        Ok(self
            .rooms
            .get(room)
            .map(|members| members.iter().copied().filter(|&c| c != client).collect())
            .unwrap_or_default())
    }

    /// Room `client` is connected to.
    pub fn room_of(&self, client: ClientId) -> Option<ModelRoomId> {
        self.connections.get(&client).copied()
    }

    /// Members of `room` in ascending order.
    pub fn members(&self, room: ModelRoomId) -> Vec<ClientId> {
        self.rooms.get(&room).map(|m| m.iter().copied().collect()).unwrap_or_default()
    }

    /// Non-empty rooms in ascending order.
    pub fn rooms(&self) -> Vec<ModelRoomId> {
        self.rooms.keys().copied().collect()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
