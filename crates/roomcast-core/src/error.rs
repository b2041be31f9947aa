//! Error types for the roomcast core.
//!
//! Session errors describe state machine misuse. Room name errors describe a
//! rejected accept path. Neither carries I/O detail; transport failures live
//! in the server crate.

use thiserror::Error;

use crate::session::SessionState;

/// Errors from the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Reasons a room name is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomNameError {
    /// Empty name
    #[error("room name is empty")]
    Empty,

    /// Name exceeds the length limit
    #[error("room name is {len} bytes, limit is {max}")]
    TooLong {
        /// Actual length in bytes
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Name contains a character that cannot appear in a path segment
    #[error("room name contains invalid character {0:?}")]
    InvalidChar(char),

    /// Percent-decoding did not produce UTF-8
    #[error("room name is not valid UTF-8 after percent-decoding")]
    InvalidEncoding,
}
