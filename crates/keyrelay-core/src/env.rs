//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). Enables
//! deterministic simulation (virtual clock, seeded RNG) and production use
//! with real system resources.

use std::time::Duration;

use crate::error::EntropyError;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` reports failure instead of returning weak bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use a virtual instant.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only used by driver code, never by protocol logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Errors
    ///
    /// - `EntropyError` if no secure random source is available. Callers
    ///   treat this as "crypto unavailable".
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// Milliseconds since the Unix epoch, used to timestamp chat messages.
    ///
    /// Not monotonic; never use it for timeouts.
    fn wall_clock_millis(&self) -> u64;

    /// Fixed-size random array.
    fn random_array<const N: usize>(&self) -> Result<[u8; N], EntropyError> {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes)?;
        Ok(bytes)
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> Result<u64, EntropyError> {
        self.random_array::<8>().map(u64::from_be_bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct CountingEnv {
        next: Arc<AtomicU8>,
    }

    impl Environment for CountingEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
            for byte in buffer {
                *byte = self.next.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        }

        fn wall_clock_millis(&self) -> u64 {
            0
        }
    }

    #[derive(Clone)]
    struct BrokenEnv;

    impl Environment for BrokenEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError { reason: "no rng".to_string() })
        }

        fn wall_clock_millis(&self) -> u64 {
            0
        }
    }

    #[test]
    fn random_array_fills_every_byte() {
        let env = CountingEnv::default();
        let bytes: [u8; 4] = env.random_array().unwrap();

        assert_eq!(bytes, [0, 1, 2, 3]);
    }

    #[test]
    fn random_u64_is_big_endian() {
        let env = CountingEnv::default();

        assert_eq!(env.random_u64().unwrap(), 0x0001_0203_0405_0607);
    }

    #[test]
    fn entropy_failure_propagates() {
        assert!(BrokenEnv.random_array::<32>().is_err());
        assert!(BrokenEnv.random_u64().is_err());
    }
}
