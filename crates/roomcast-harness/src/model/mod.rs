//! Reference model for model-based testing.
//!
//! [`ModelRegistry`] is a deliberately naive implementation of room
//! membership: plain maps, no locking, no I/O. Tests apply the same
//! [`Operation`] sequence to it and to the real registry and require the
//! observable results to agree.

mod operation;
mod registry;

pub use operation::{ClientId, ModelRoomId, Operation};
pub use registry::{ModelError, ModelRegistry};
