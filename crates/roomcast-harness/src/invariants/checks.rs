//! Standard invariant checks.
//!
//! These invariants capture structural properties of membership that must
//! hold whenever the registry is at rest.

use std::collections::BTreeMap;

use super::{Invariant, InvariantResult, RegistrySnapshot, Violation};

/// Listed rooms are never empty.
///
/// A room must disappear when its last member leaves, so every room the
/// registry reports has at least one member and agrees with its own size.
pub struct NoEmptyRooms;

impl Invariant for NoEmptyRooms {
    fn name(&self) -> &'static str {
        "no_empty_rooms"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        for room in &state.rooms {
            if room.members.is_empty() || room.reported_members != room.members.len() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "room {}: reported {} members, listed {:?}",
                        room.room, room.reported_members, room.members
                    ),
                });
            }
        }

        if state.room_count != state.rooms.len() {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "room_count {} but {} rooms listed",
                    state.room_count,
                    state.rooms.len()
                ),
            });
        }

        Ok(())
    }
}

/// A connection belongs to exactly one room.
///
/// No connection ID is listed in two rooms, and `room_of` names the room
/// that lists it.
pub struct SingleMembership;

impl Invariant for SingleMembership {
    fn name(&self) -> &'static str {
        "single_membership"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        let mut seen = BTreeMap::new();

        for room in &state.rooms {
            for id in &room.members {
                if let Some(previous) = seen.insert(*id, &room.room) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{id} listed in both {previous} and {}", room.room),
                    });
                }

                let reported = state.connections.get(id).and_then(|(room, _)| room.as_ref());
                if reported != Some(&room.room) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{id} listed in {} but room_of reports {reported:?}",
                            room.room
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Every connection is counted once and has an identity.
pub struct ConnectionsAccounted;

impl Invariant for ConnectionsAccounted {
    fn name(&self) -> &'static str {
        "connections_accounted"
    }

    fn check(&self, state: &RegistrySnapshot) -> InvariantResult {
        let listed: usize = state.rooms.iter().map(|room| room.members.len()).sum();

        if listed != state.connection_count {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{listed} members listed but connection_count is {}",
                    state.connection_count
                ),
            });
        }

        if let Some((id, _)) = state.connections.iter().find(|(_, (_, identity))| identity.is_none())
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{id} is a member but has no identity"),
            });
        }

        Ok(())
    }
}
