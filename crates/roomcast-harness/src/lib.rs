//! Deterministic simulation harness for roomcast testing.
//!
//! Seeded implementations of the `Environment` trait, in-memory connection
//! halves, and a turmoil-backed server for deterministic, reproducible
//! testing of the registry and session handler.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of room
//! membership. Operations are applied to both the model and the real
//! registry, and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks structural properties of a registry
//! snapshot. Use [`InvariantRegistry::standard()`] for the membership
//! invariants every registry state must satisfy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod memory;
pub mod model;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ConnectionsAccounted, Invariant, InvariantRegistry, InvariantResult, NoEmptyRooms,
    RegistrySnapshot, RoomSnapshot, SingleMembership, Violation,
};
pub use memory::{MemoryInbound, MemoryOutbound, MemoryPeer, memory_connection};
pub use model::{ClientId, ModelError, ModelRegistry, ModelRoomId, Operation};
pub use sim_env::SimEnv;
pub use sim_server::{SIM_PORT, SimServer};
