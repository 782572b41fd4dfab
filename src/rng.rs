//! Deterministic, splittable RNG source (section 5's reproducibility
//! contract and section 2.1's ambient-stack note).
//!
//! Only the *contract* of the underlying generator is specified by section
//! 1 ("the pseudo-random generator source... only its contract"); this port
//! picks a concrete one, `rand_xoshiro::Xoshiro256PlusPlus`, the generator
//! the pack's other MCMC crate (`schmidmt-rmcmc`) reaches for in its own
//! reproducible tests. Given the same seed and model, `mh` and `nuts` must
//! draw bit-identical sequences from this type.

use rand::{Error, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Debug, Clone)]
pub struct SamplerRng(Xoshiro256PlusPlus);

impl SamplerRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        SamplerRng(Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    /// Derives an independent, non-overlapping stream from this generator,
    /// advancing `self` past the derived stream's period. Multi-chain
    /// coordination itself is a Non-goal (section 5); this only gives a
    /// caller who spins up chains externally a way to avoid correlated
    /// streams without this crate mediating between them.
    pub fn split(&mut self) -> Self {
        let mut child = self.0.clone();
        child.long_jump();
        self.0.jump();
        SamplerRng(child)
    }
}

/// Seed source used when a config's `seed` field is `None`: OS entropy, per
/// section 5 ("default: OS entropy").
pub fn default_seed() -> u64 {
    rand::rngs::OsRng.next_u64()
}

impl RngCore for SamplerRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.0.try_fill_bytes(dest)
    }
}
