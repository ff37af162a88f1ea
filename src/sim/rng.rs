//! Seeded random streams
//!
//! A simulation draws every random value (spawn offsets, jitter, bucket
//! pattern offsets) from one [`SimRng`], so the same seed reproduces the same
//! search, attempt for attempt.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Fold a text seed into 32 bits (`h = h * 31 + byte`, wrapping)
pub fn hash_seed(seed: &str) -> u32 {
    seed.bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn from_text(seed: &str) -> Self {
        Self::new(u64::from(hash_seed(seed)))
    }

    /// Seed from text when given, otherwise from entropy
    pub fn resolve(seed: Option<&str>) -> Self {
        match seed {
            Some(text) => Self::from_text(text),
            None => Self::new(rand::rng().random()),
        }
    }

    pub fn to_rng(&self) -> SimRng {
        SimRng {
            inner: Pcg32::seed_from_u64(self.seed),
        }
    }
}

/// Deterministic stream used by the simulators
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: Pcg32,
}

impl SimRng {
    pub fn from_seed(seed: Option<&str>) -> Self {
        RngState::resolve(seed).to_rng()
    }

    /// Uniform in `[0, 1)`
    pub fn unit(&mut self) -> f32 {
        self.inner.random::<f32>()
    }

    /// Uniform in `[lo, hi)`; returns `lo` for an empty range
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.unit()
    }

    /// Uniform index below `len` (0 when `len` is 0)
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.inner.random_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_seed() {
        assert_eq!(hash_seed(""), 0);
        assert_eq!(hash_seed("a"), 97);
        assert_eq!(hash_seed("ab"), 97 * 31 + 98);
        assert_ne!(hash_seed("race-1"), hash_seed("race-2"));
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SimRng::from_seed(Some("plinko"));
        let mut b = SimRng::from_seed(Some("plinko"));
        for _ in 0..32 {
            assert_eq!(a.unit(), b.unit());
        }
    }

    #[test]
    fn test_ranges() {
        let mut rng = SimRng::from_seed(Some("ranges"));
        for _ in 0..200 {
            let v = rng.range(-5.0, 5.0);
            assert!((-5.0..5.0).contains(&v));
            assert!(rng.index(3) < 3);
        }
        assert_eq!(rng.range(2.0, 2.0), 2.0);
        assert_eq!(rng.index(0), 0);
    }
}
