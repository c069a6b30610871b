//! Seeded environment with a virtual clock.
//!
//! Every clone shares one RNG and one clock, so a whole simulated world
//! (several clients, their drivers, the relay) advances together and replays
//! identically for the same seed.

use std::{
    ops::Sub,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use keyrelay_core::{EntropyError, env::Environment};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall-clock origin for simulated timestamps (2024-01-01T00:00:00Z).
const SIM_EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Virtual instant: time since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since the simulation started.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

struct SimState {
    rng: ChaCha20Rng,
    now: Duration,
    entropy_available: bool,
}

/// Deterministic [`Environment`] for simulation.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Environment whose randomness is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let state =
            SimState { rng: ChaCha20Rng::seed_from_u64(seed), now: Duration::ZERO, entropy_available: true };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Environment with no entropy source; identity generation fails.
    pub fn without_entropy(seed: u64) -> Self {
        let env = Self::with_seed(seed);
        env.set_entropy_available(false);
        env
    }

    /// Switch the entropy source on or off.
    pub fn set_entropy_available(&self, available: bool) {
        self.lock().entropy_available = available;
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        self.lock().now += duration;
    }

    /// Virtual time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.lock().now
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.lock().now)
    }

    /// Sleeping advances virtual time instead of waiting.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        let mut state = self.lock();
        if !state.entropy_available {
            return Err(EntropyError { reason: "simulated entropy failure".to_string() });
        }
        state.rng.fill_bytes(buffer);
        Ok(())
    }

    fn wall_clock_millis(&self) -> u64 {
        SIM_EPOCH_MILLIS + self.lock().now.as_millis() as u64
    }
}
