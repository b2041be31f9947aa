//! Invariant checking for registry state.
//!
//! Invariants are properties that must always hold between operations.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify structural properties of membership across every execution path.
//!
//! # Architecture
//!
//! Observable state is extracted from a `RoomRegistry` into a
//! [`RegistrySnapshot`], then registered [`Invariant`] checks run against
//! it. Violations carry enough context to debug the failing sequence.
//!
//! # Usage
//!
//! ```ignore
//! let invariants = InvariantRegistry::standard();
//! let snapshot = RegistrySnapshot::capture(&registry);
//! invariants.assert_all(&snapshot, "after disconnect");
//! ```

mod checks;
mod snapshot;

pub use checks::{ConnectionsAccounted, NoEmptyRooms, SingleMembership};
pub use snapshot::{RegistrySnapshot, RoomSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against registry state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, state: &RegistrySnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard membership invariants.
    ///
    /// Includes:
    /// - [`NoEmptyRooms`]: every listed room has a member
    /// - [`SingleMembership`]: a connection is in exactly one room
    /// - [`ConnectionsAccounted`]: room sizes add up to the connection count
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(NoEmptyRooms);
        registry.add(SingleMembership);
        registry.add(ConnectionsAccounted);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &RegistrySnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on the first failing call.
    pub fn assert_all(&self, state: &RegistrySnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(|v| v.to_string()).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
