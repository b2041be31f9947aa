//! Roomcast core.
//!
//! Pure room-chat logic with no I/O: connection and display identities, room
//! names, and the per-connection session state machine.
//!
//! # Architecture
//!
//! The session follows the Sans-IO pattern. Callers feed it events (activation,
//! inbound text, close) and execute the [`SessionAction`]s it returns against
//! the shared registry. Randomness is injected through [`Environment`] so tests
//! can reproduce identity assignment from a seed.
//!
//! # Components
//!
//! - [`Session`]: `Connecting → Active → Closed` state machine
//! - [`Identity`]: short display label assigned at connect time
//! - [`RoomName`]: validated room name taken from the accept path
//! - [`Environment`]: randomness abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod identity;
pub mod room;
pub mod session;

pub use env::Environment;
pub use error::{RoomNameError, SessionError};
pub use identity::{ConnectionId, Identity};
pub use room::RoomName;
pub use session::{CloseReason, Session, SessionAction, SessionState, format_broadcast};
