//! Operations for model-based testing.
//!
//! Operations represent every action a connection can take against the
//! registry. They are generated randomly and applied to both the model and
//! the real implementation.

use arbitrary::Arbitrary;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Room identifier (uses u8 to keep test space manageable).
pub type ModelRoomId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client opens a connection to a room.
    Connect {
        /// Client connecting.
        client_id: ClientId,
        /// Room named in the connection path.
        room_id: ModelRoomId,
    },

    /// Client sends a message to its room.
    Send {
        /// Client sending.
        client_id: ClientId,
        /// Message seed (expanded to text in real tests).
        seed: u8,
    },

    /// Client closes its connection.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },
}

impl Operation {
    /// Fold ids into `0..num_clients` and `0..num_rooms`, so operations
    /// decoded from raw bytes land on a small, colliding client space.
    pub fn bounded(self, num_clients: u8, num_rooms: u8) -> Self {
        let client = |id: ClientId| id % num_clients.max(1);
        match self {
            Self::Connect { client_id, room_id } => {
                Self::Connect { client_id: client(client_id), room_id: room_id % num_rooms.max(1) }
            },
            Self::Send { client_id, seed } => Self::Send { client_id: client(client_id), seed },
            Self::Disconnect { client_id } => Self::Disconnect { client_id: client(client_id) },
        }
    }

    /// Room name used for a model room.
    pub fn room_name(room_id: ModelRoomId) -> String {
        format!("room-{room_id}")
    }

    /// Text sent for a message seed.
    pub fn message_text(client_id: ClientId, seed: u8) -> String {
        format!("c{client_id}-m{seed}")
    }
}
