//! Production Environment implementation using the OS RNG.
//!
//! `SystemEnv` draws identity bytes from getrandom. Production identities are
//! therefore not reproducible; tests use the seeded environment from the
//! harness instead.

use roomcast_core::Environment;

/// Production environment backed by OS randomness.
///
/// # Panics
///
/// Panics if the OS RNG fails. RNG failure is extremely rare (indicates
/// OS-level issues) and there is no meaningful identity to fall back to.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG is available");
    }
}

#[cfg(test)]
mod tests {
    use roomcast_core::Identity;

    use super::*;

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_generates_hex_identities() {
        let identity = Identity::generate(&SystemEnv::new());

        assert_eq!(identity.as_str().len(), Identity::LEN);
        assert!(identity.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }
}
