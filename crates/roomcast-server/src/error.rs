//! Server error types.
//!
//! Provides strongly-typed errors for each layer of the server:
//! - Accepting a connection (handshake, path routing)
//! - Reading from and writing to a live connection
//! - Per-recipient delivery during a broadcast
//! - Registry bookkeeping
//!
//! None of these are fatal to the process. Every failure is scoped to one
//! connection or one delivery.

use std::{io, time::Duration};

use roomcast_core::{ConnectionId, RoomName, RoomNameError, SessionError};
use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, bad prefix, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener-level network error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Connection never reached the Active state.
    #[error("accept failed: {0}")]
    Accept(#[from] AcceptError),

    /// Registry rejected an operation.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Session state machine misuse. Indicates a bug.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Transport-level upgrade failed. The session never registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcceptError {
    /// Request path is not under the chat prefix
    #[error("no room at path {path:?}")]
    NotFound {
        /// Requested path
        path: String,
    },

    /// Path segment is not an acceptable room name
    #[error("invalid room name: {0}")]
    InvalidRoom(#[from] RoomNameError),

    /// WebSocket handshake failed
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Peer did not finish the handshake in time
    #[error("handshake not completed within {timeout:?}")]
    TimedOut {
        /// Configured handshake timeout
        timeout: Duration,
    },

    /// Server began shutting down before the handshake finished
    #[error("server shutting down")]
    ShuttingDown,
}

/// Errors reading from or writing to a live connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection is closed
    #[error("connection closed")]
    Closed,

    /// Reading the next inbound message failed
    #[error("read failed: {0}")]
    Read(String),

    /// Writing an outbound message failed
    #[error("write failed: {0}")]
    Write(String),
}

/// Delivery to one broadcast recipient failed.
///
/// Reported per recipient. Never aborts delivery to the rest of the room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Recipient's connection closed between snapshot and delivery
    #[error("connection {connection_id} disconnected during send: {source}")]
    DisconnectedDuringSend {
        /// Recipient
        connection_id: ConnectionId,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// Recipient did not accept the write in time
    #[error("send to connection {connection_id} timed out after {timeout:?}")]
    TimedOut {
        /// Recipient
        connection_id: ConnectionId,
        /// Configured send timeout
        timeout: Duration,
    },
}

impl DeliveryError {
    /// Recipient the failure belongs to.
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Self::DisconnectedDuringSend { connection_id, .. }
            | Self::TimedOut { connection_id, .. } => *connection_id,
        }
    }
}

/// Registry bookkeeping errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connection is already a member of a room.
    ///
    /// A connection belongs to at most one room. This is a logic bug in the
    /// caller - connection IDs are never reused.
    #[error("connection {connection_id} is already in room {room}")]
    AlreadyConnected {
        /// Connection that tried to join twice
        connection_id: ConnectionId,
        /// Room it is already in
        room: RoomName,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("bad prefix".to_string());
        assert_eq!(err.to_string(), "configuration error: bad prefix");

        let err = ServerError::from(AcceptError::NotFound { path: "/nope".to_string() });
        assert_eq!(err.to_string(), "accept failed: no room at path \"/nope\"");

        let err = AcceptError::TimedOut { timeout: Duration::from_millis(250) };
        assert_eq!(err.to_string(), "handshake not completed within 250ms");
    }

    #[test]
    fn delivery_error_display() {
        let err = DeliveryError::DisconnectedDuringSend {
            connection_id: ConnectionId::new(3),
            source: TransportError::Closed,
        };
        assert_eq!(err.to_string(), "connection 3 disconnected during send: connection closed");
        assert_eq!(err.connection_id(), ConnectionId::new(3));

        let err = DeliveryError::TimedOut {
            connection_id: ConnectionId::new(4),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "send to connection 4 timed out after 5s");
    }

    #[test]
    fn registry_error_display() {
        let err = RegistryError::AlreadyConnected {
            connection_id: ConnectionId::new(9),
            room: RoomName::new("lobby").unwrap(),
        };
        assert_eq!(err.to_string(), "connection 9 is already in room lobby");
    }
}
