//! Bootstrap sampling for bagged ensembles.
//!
//! All randomness flows through an explicit [`Sampler`] handle. There is no
//! process-wide generator: whoever builds an ensemble owns the sampler, and
//! reseeding it is an ordinary method call.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common_types::FeatureId;

/// Number of examples drawn (with replacement) for each tree.
pub const DEFAULT_EXAMPLE_SAMPLE_SIZE: usize = 100;
/// Number of feature draws (with replacement, then deduplicated) for each tree.
pub const DEFAULT_FEATURE_SAMPLE_SIZE: usize = 100;
pub const DEFAULT_SEED: u64 = 1992;

/// How bootstrap draws are distributed when trees are built concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamplingStrategy {
    /// Draw every tree's sample from the shared sampler, in tree order, before
    /// any tree is built. Serial and parallel builds yield the same ensemble.
    #[default]
    Upfront,
    /// Draw one seed per tree from the shared sampler; each tree then samples
    /// from its own generator inside its build task.
    PerTreeSeed,
}

/// The examples and candidate features one tree is trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlan {
    /// Indices into the example pool; duplicates are expected.
    pub example_indices: Vec<usize>,
    pub feature_ids: BTreeSet<FeatureId>,
}

/// Seeded random source for bootstrap draws.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: StdRng,
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler::new(DEFAULT_SEED)
    }
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Sampler {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Restarts the generator; subsequent draws repeat those of a fresh `Sampler::new(seed)`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// `size` indices drawn uniformly with replacement from `0..population`.
    ///
    /// Returns an empty sample for an empty population.
    pub fn bootstrap_indices(&mut self, population: usize, size: usize) -> Vec<usize> {
        if population == 0 {
            return Vec::new();
        }
        (0..size).map(|_| self.rng.gen_range(0..population)).collect()
    }

    /// `draws` feature ids drawn uniformly with replacement, deduplicated.
    ///
    /// The result holds at most `draws` ids and usually fewer.
    pub fn bootstrap_features(
        &mut self,
        features: &BTreeSet<FeatureId>,
        draws: usize,
    ) -> BTreeSet<FeatureId> {
        let pool: Vec<FeatureId> = features.iter().copied().collect();
        self.bootstrap_indices(pool.len(), draws)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    }

    /// Examples first, then features, as one tree's plan.
    pub fn draw_plan(
        &mut self,
        population: usize,
        example_sample_size: usize,
        features: &BTreeSet<FeatureId>,
        feature_sample_size: usize,
    ) -> SamplePlan {
        let example_indices = self.bootstrap_indices(population, example_sample_size);
        let feature_ids = self.bootstrap_features(features, feature_sample_size);
        SamplePlan {
            example_indices,
            feature_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_indices_size_and_range() {
        let mut sampler = Sampler::new(7);
        let sample = sampler.bootstrap_indices(5, 100);
        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|&i| i < 5));
    }

    #[test]
    fn test_bootstrap_features_deduplicates() {
        let mut sampler = Sampler::new(7);
        let features: BTreeSet<FeatureId> = (0..10).collect();
        let sample = sampler.bootstrap_features(&features, 100);
        assert!(sample.len() <= 10);
        assert!(sample.is_subset(&features));

        let wide: BTreeSet<FeatureId> = (0..1000).collect();
        let sample = sampler.bootstrap_features(&wide, 100);
        assert!(!sample.is_empty() && sample.len() <= 100);
    }

    #[test]
    fn test_reseed_repeats_draws() {
        let features: BTreeSet<FeatureId> = (0..50).collect();
        let mut sampler = Sampler::new(1);
        let first = sampler.draw_plan(20, 100, &features, 100);
        sampler.reseed(1);
        let second = sampler.draw_plan(20, 100, &features, 100);
        assert_eq!(first, second);

        let third = sampler.draw_plan(20, 100, &features, 100);
        assert_ne!(first, third);
    }

    #[test]
    fn test_empty_population() {
        let mut sampler = Sampler::default();
        assert!(sampler.bootstrap_indices(0, 100).is_empty());
        assert!(sampler.bootstrap_features(&BTreeSet::new(), 100).is_empty());
    }
}
