//! Deterministic simulation RNG.
//!
//! The kernel itself never draws random numbers: process interleaving is
//! fixed by the event ordering.  Randomness only enters through components
//! that explicitly own a [`SimRng`] (the random-search assigner), each seeded
//! from the run seed so two runs with the same configuration are identical.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Seeded RNG wrapper around `SmallRng`.
///
/// `!Sync` by construction; the simulator is single-threaded and every
/// consumer owns its own instance.
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }
}
