//! Connection handles and display identities.
//!
//! A [`ConnectionId`] is the process-unique handle the registry keys on. An
//! [`Identity`] is the short label other room members see in front of every
//! message. The two are deliberately separate: identities are random and may
//! collide, connection IDs never do.

use std::fmt;

use crate::env::Environment;

/// Process-unique handle for one live connection.
///
/// Allocated by the registry from a monotonic counter. Never reused after the
/// connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw counter value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display label assigned to a connection at connect time.
///
/// Eight lowercase hex characters. Immutable for the life of the connection.
/// Collisions between concurrent connections are tolerated: the label is only
/// ever shown to people, delivery is keyed by [`ConnectionId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Number of characters in a generated identity.
    pub const LEN: usize = 8;

    /// Draw a fresh identity from the environment's RNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        Self::from_bits(env.random_u32())
    }

    /// Identity for a fixed 32-bit value.
    pub fn from_bits(bits: u32) -> Self {
        Self(format!("{bits:08x}"))
    }

    /// Label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FixedEnv([u8; 4]);

    impl Environment for FixedEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            for (dst, src) in buffer.iter_mut().zip(self.0.iter().cycle()) {
                *dst = *src;
            }
        }
    }

    #[test]
    fn generated_identity_is_eight_hex_chars() {
        let identity = Identity::generate(&FixedEnv([0xde, 0xad, 0x00, 0x0f]));

        assert_eq!(identity.as_str(), "dead000f");
        assert_eq!(identity.as_str().len(), Identity::LEN);
    }

    #[test]
    fn small_values_are_zero_padded() {
        assert_eq!(Identity::from_bits(0x2a).to_string(), "0000002a");
    }

    #[test]
    fn same_bytes_give_same_identity() {
        let env = FixedEnv([1, 2, 3, 4]);
        assert_eq!(Identity::generate(&env), Identity::generate(&env));
    }

    #[test]
    fn connection_id_round_trips_raw_value() {
        let id = ConnectionId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }
}
