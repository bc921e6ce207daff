//! Time and randomness sources for the sampling loop.

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Uniform integers.
pub trait RandomSource: Send + Sync {
    /// A value uniformly distributed in `0..bound`. `bound` is never zero.
    fn below(&mut self, bound: u32) -> u32;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// [`RandomSource`] backed by a `StdRng` seeded from the OS.
pub struct OsRandom {
    rng: StdRng,
}

impl OsRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for OsRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for OsRandom {
    fn below(&mut self, bound: u32) -> u32 {
        self.rng.gen_range(0..bound)
    }
}
