//! Observable registry state.

use std::collections::BTreeMap;

use roomcast_core::{ConnectionId, Environment, Identity, RoomName};
use roomcast_server::RoomRegistry;

/// One room as seen through the registry's observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room name.
    pub room: RoomName,
    /// Size reported by `RoomRegistry::rooms`.
    pub reported_members: usize,
    /// Members reported by `RoomRegistry::members`.
    pub members: Vec<ConnectionId>,
}

/// Everything the registry exposes about its membership.
///
/// Captured through separate observer calls, so it is only coherent while no
/// other task mutates the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// Rooms in name order.
    pub rooms: Vec<RoomSnapshot>,
    /// `RoomRegistry::room_count`.
    pub room_count: usize,
    /// `RoomRegistry::connection_count`.
    pub connection_count: usize,
    /// Room and identity the registry reports for each listed member.
    pub connections: BTreeMap<ConnectionId, (Option<RoomName>, Option<Identity>)>,
}

impl RegistrySnapshot {
    /// Capture the registry's current observable state.
    pub fn capture<E: Environment>(registry: &RoomRegistry<E>) -> Self {
        let rooms: Vec<RoomSnapshot> = registry
            .rooms()
            .into_iter()
            .map(|stats| RoomSnapshot {
                members: registry.members(&stats.room),
                reported_members: stats.members,
                room: stats.room,
            })
            .collect();

        let connections = rooms
            .iter()
            .flat_map(|room| room.members.iter().copied())
            .map(|id| (id, (registry.room_of(id), registry.identity(id))))
            .collect();

        Self {
            rooms,
            room_count: registry.room_count(),
            connection_count: registry.connection_count(),
            connections,
        }
    }
}
