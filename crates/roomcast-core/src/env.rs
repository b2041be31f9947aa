//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system randomness. Production uses the OS
//! entropy source, simulation uses a seeded RNG so identity assignment is
//! reproducible.

/// Abstract environment providing randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` fills the entire buffer
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u32`.
    ///
    /// Four bytes is exactly one display identity.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Environment that counts upward from a fixed byte.
    #[derive(Clone)]
    struct CountingEnv(u8);

    impl Environment for CountingEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, b) in buffer.iter_mut().enumerate() {
                *b = self.0.wrapping_add(i as u8);
            }
        }
    }

    #[test]
    fn random_u32_is_big_endian_over_four_bytes() {
        let env = CountingEnv(1);
        assert_eq!(env.random_u32(), 0x0102_0304);
    }

    #[test]
    fn random_u64_is_big_endian_over_eight_bytes() {
        let env = CountingEnv(0);
        assert_eq!(env.random_u64(), 0x0001_0203_0405_0607);
    }
}
