//! Seeded noise source for the simulated devices

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Noise generator with optional deterministic seeding
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// Seed 0 draws from entropy; any other seed is reproducible
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Zero-mean Gaussian sample
    #[inline]
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// Uniform sample in [0, 1)
    #[inline]
    pub fn uniform(&mut self) -> f32 {
        Uniform::new(0.0f32, 1.0).sample(&mut self.rng)
    }

    /// True with the given probability; never for 0, always for 1
    #[inline]
    pub fn chance(&mut self, probability: f32) -> bool {
        if probability <= 0.0 {
            return false;
        }
        self.uniform() < probability
    }
}
