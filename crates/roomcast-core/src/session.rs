//! Room session state machine.
//!
//! Tracks one accepted connection from registration to teardown. Uses the
//! action pattern: methods take events and return actions for the runtime to
//! execute against the registry. The state machine itself never touches
//! shared state, which keeps it trivially testable.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  activate   ┌────────┐
//! │ Connecting │────────────>│ Active │──┐ on_text → Broadcast
//! └────────────┘             └────────┘<─┘
//!       │                         │
//!       │ close (no actions)      │ close → Deregister (once)
//!       ↓                         ↓
//!                 ┌────────┐
//!                 │ Closed │  terminal
//!                 └────────┘
//! ```

use std::fmt;

use crate::{
    error::SessionError,
    identity::{ConnectionId, Identity},
    room::RoomName,
};

/// Separator between the sender identity and the message text.
pub const SEPARATOR: &str = " :: ";

/// Format an outbound room message.
pub fn format_broadcast(identity: &Identity, text: &str) -> String {
    let mut message = String::with_capacity(identity.as_str().len() + SEPARATOR.len() + text.len());
    message.push_str(identity.as_str());
    message.push_str(SEPARATOR);
    message.push_str(text);
    message
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted but not yet registered with a room
    Connecting,
    /// Registered; relaying inbound messages
    Active,
    /// Torn down (terminal)
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the connection
    ClientClosed,
    /// Reading the next inbound message failed
    ReadError(String),
    /// Server is shutting down
    ServerShutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => f.write_str("client closed"),
            Self::ReadError(err) => write!(f, "read error: {err}"),
            Self::ServerShutdown => f.write_str("server shutdown"),
        }
    }
}

/// Actions returned by the session state machine.
///
/// The runtime executes these against the registry:
/// - `Broadcast`: fan the message out to the rest of the room
/// - `Deregister`: remove the connection from its room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Deliver `message` to every other member of `room`
    Broadcast {
        /// Room the session belongs to
        room: RoomName,
        /// Fully formatted message (`"<identity> :: <text>"`)
        message: String,
    },

    /// Remove the connection from `room`
    Deregister {
        /// Room the session belongs to
        room: RoomName,
    },
}

/// Room session state machine.
///
/// Pure state, no I/O. One per accepted connection.
#[derive(Debug, Clone)]
pub struct Session {
    connection_id: ConnectionId,
    room: RoomName,
    state: SessionState,
    identity: Option<Identity>,
    messages_sent: u64,
}

impl Session {
    /// Create a session in [`SessionState::Connecting`].
    pub fn new(connection_id: ConnectionId, room: RoomName) -> Self {
        Self {
            connection_id,
            room,
            state: SessionState::Connecting,
            identity: None,
            messages_sent: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connection this session drives.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Room named in the accept path.
    #[must_use]
    pub fn room(&self) -> &RoomName {
        &self.room
    }

    /// Identity assigned at registration. `None` before activation.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Number of inbound messages relayed so far.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Record successful registration and enter [`SessionState::Active`].
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in Connecting state
    pub fn activate(&mut self, identity: Identity) -> Result<(), SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState { state: self.state, operation: "activate" });
        }

        self.identity = Some(identity);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Handle one inbound text message.
    ///
    /// Returns the broadcast the runtime must perform.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in Active state
    pub fn on_text(&mut self, text: &str) -> Result<SessionAction, SessionError> {
        let (SessionState::Active, Some(identity)) = (self.state, self.identity.as_ref()) else {
            return Err(SessionError::InvalidState { state: self.state, operation: "on_text" });
        };

        let message = format_broadcast(identity, text);
        self.messages_sent += 1;

        Ok(SessionAction::Broadcast { room: self.room.clone(), message })
    }

    /// Close the session.
    ///
    /// From Active this yields exactly one `Deregister`. From Connecting
    /// nothing was registered, so there is nothing to undo. Closing a closed
    /// session is a no-op.
    pub fn close(&mut self) -> Vec<SessionAction> {
        let previous = self.state;
        self.state = SessionState::Closed;

        match previous {
            SessionState::Active => vec![SessionAction::Deregister { room: self.room.clone() }],
            SessionState::Connecting | SessionState::Closed => Vec::new(),
        }
    }
}
