//! Client
//!
//! WebSocket client for roomcast chat rooms. Connects to a room and exposes
//! the connection as a pair of tokio channels so callers never touch the
//! socket directly.
//!
//! # Components
//!
//! - [`transport::connect`]: Connect to a room over TCP
//! - [`transport::connect_with_stream`]: Connect over an existing stream
//! - [`transport::ConnectedClient`]: Channel handle for a live connection
//! - [`transport::room_url`]: Build a room URL from a base and a name

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod transport;

pub use transport::{
    ConnectedClient, TransportError, connect, connect_with_stream, room_url,
};
