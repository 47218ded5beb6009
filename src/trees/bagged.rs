//! Bootstrap-aggregated decision trees.
//!
//! Each tree sees a bootstrap sample of the examples and a deduplicated bootstrap
//! sample of the candidate features. Predictions are combined by majority vote;
//! the raw per-tree votes are exposed as well, for use as features downstream.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::common_types::LabeledExample;
use crate::error::{Result, TreeError};
use crate::features::{ExampleResolver, FeatureRegistry};
use crate::parallelism::{Deadline, Parallelism};
use crate::sampling::{
    SamplePlan, Sampler, SamplingStrategy, DEFAULT_EXAMPLE_SAMPLE_SIZE,
    DEFAULT_FEATURE_SAMPLE_SIZE, DEFAULT_SEED,
};
use crate::tally::LabelTally;
use crate::trees::decision_tree::{DecisionTree, TreeOptions};

/// Hyper-parameters for [`BaggedTrees`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BaggingConfig {
    pub n_trees: usize,
    /// Maximum depth of every tree.
    pub tree_depth: usize,
    /// Examples drawn with replacement per tree.
    pub example_sample_size: usize,
    /// Feature draws per tree; duplicates collapse, so trees see at most this many.
    pub feature_sample_size: usize,
    pub seed: u64,
    pub sampling: SamplingStrategy,
    pub tree_parallelism: Parallelism,
    pub split_parallelism: Parallelism,
    /// How long `build` may run before failing. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for BaggingConfig {
    fn default() -> Self {
        BaggingConfig {
            n_trees: 10,
            tree_depth: 3,
            example_sample_size: DEFAULT_EXAMPLE_SAMPLE_SIZE,
            feature_sample_size: DEFAULT_FEATURE_SAMPLE_SIZE,
            seed: DEFAULT_SEED,
            sampling: SamplingStrategy::Upfront,
            tree_parallelism: Parallelism::Sequential,
            split_parallelism: Parallelism::Sequential,
            timeout: None,
        }
    }
}

impl BaggingConfig {
    pub fn new(n_trees: usize, tree_depth: usize) -> Self {
        BaggingConfig {
            n_trees,
            tree_depth,
            ..Self::default()
        }
    }

    pub fn with_sample_sizes(mut self, examples: usize, features: usize) -> Self {
        self.example_sample_size = examples;
        self.feature_sample_size = features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_tree_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.tree_parallelism = parallelism;
        self
    }

    pub fn with_split_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.split_parallelism = parallelism;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(TreeError::InvalidConfig("n_trees must be > 0".into()));
        }
        if self.example_sample_size == 0 {
            return Err(TreeError::InvalidConfig(
                "example_sample_size must be > 0".into(),
            ));
        }
        if self.feature_sample_size == 0 {
            return Err(TreeError::InvalidConfig(
                "feature_sample_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Work item for one tree: a ready sample, or a seed to draw one from.
enum TreeJob {
    Plan(SamplePlan),
    Seed(u64),
}

/// An ensemble of decision trees voting on a label. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaggedTrees<L> {
    trees: Vec<DecisionTree<L>>,
}

impl<L> BaggedTrees<L>
where
    L: Ord + Clone + Send + Sync,
{
    /// Builds the ensemble with a sampler seeded from `config.seed`.
    pub fn fit<E, R, X>(
        examples: &[LabeledExample<E, L>],
        feature_types: &BTreeSet<R::FeatureType>,
        registry: &R,
        resolver: &X,
        config: &BaggingConfig,
    ) -> Result<Self>
    where
        E: Sync,
        R: FeatureRegistry + Sync + ?Sized,
        X: ExampleResolver<E> + Sync + ?Sized,
    {
        let mut sampler = Sampler::new(config.seed);
        Self::build(examples, feature_types, registry, resolver, config, &mut sampler)
    }

    /// Builds `config.n_trees` trees, drawing every bootstrap sample from `sampler`.
    ///
    /// Blocks until every tree is built. Fails without returning a partial
    /// ensemble if the example pool or feature universe is empty, if any tree
    /// fails, or if `config.timeout` elapses first.
    ///
    /// At most one tree pool and one split pool are created per call, so a
    /// parallel build never runs on more than
    /// `tree_parallelism.n_threads() + split_parallelism.n_threads()` workers.
    pub fn build<E, R, X>(
        examples: &[LabeledExample<E, L>],
        feature_types: &BTreeSet<R::FeatureType>,
        registry: &R,
        resolver: &X,
        config: &BaggingConfig,
        sampler: &mut Sampler,
    ) -> Result<Self>
    where
        E: Sync,
        R: FeatureRegistry + Sync + ?Sized,
        X: ExampleResolver<E> + Sync + ?Sized,
    {
        config.validate()?;
        if examples.is_empty() {
            return Err(TreeError::EmptyExamples);
        }
        let feature_ids = registry.ids_for(feature_types);
        if feature_ids.is_empty() {
            return Err(TreeError::EmptyFeatureUniverse);
        }

        let start = Instant::now();
        let deadline = config.timeout.map(Deadline::after);
        info!(
            n_trees = config.n_trees,
            n_examples = examples.len(),
            n_features = feature_ids.len(),
            sampling = ?config.sampling,
            parallelism = ?config.tree_parallelism,
            "building bagged trees"
        );

        let jobs: Vec<TreeJob> = (0..config.n_trees)
            .map(|_| match config.sampling {
                SamplingStrategy::Upfront => TreeJob::Plan(sampler.draw_plan(
                    examples.len(),
                    config.example_sample_size,
                    &feature_ids,
                    config.feature_sample_size,
                )),
                SamplingStrategy::PerTreeSeed => TreeJob::Seed(sampler.next_seed()),
            })
            .collect();

        let tree_pool = config.tree_parallelism.pool()?;
        let split_pool = config.split_parallelism.pool()?;

        let build_one = |(index, job): (usize, TreeJob)| -> Result<DecisionTree<L>> {
            let plan = match job {
                TreeJob::Plan(plan) => plan,
                TreeJob::Seed(seed) => Sampler::new(seed).draw_plan(
                    examples.len(),
                    config.example_sample_size,
                    &feature_ids,
                    config.feature_sample_size,
                ),
            };
            let sample: Vec<&LabeledExample<E, L>> =
                plan.example_indices.iter().map(|&i| &examples[i]).collect();
            let options = TreeOptions {
                max_depth: config.tree_depth,
                split_parallelism: config.split_parallelism,
                deadline,
            };
            let tree = DecisionTree::build_from_refs(
                &sample,
                &plan.feature_ids,
                registry,
                resolver,
                options,
                split_pool.as_ref(),
            )?;
            debug!(
                tree = index,
                depth = tree.depth(),
                n_leaves = tree.n_leaves(),
                n_features = plan.feature_ids.len(),
                "tree built"
            );
            Ok(tree)
        };

        let built: Result<Vec<DecisionTree<L>>> = match &tree_pool {
            Some(pool) => pool.install(|| jobs.into_par_iter().enumerate().map(build_one).collect()),
            None => jobs.into_iter().enumerate().map(build_one).collect(),
        };

        let trees = match built {
            Ok(trees) => trees,
            Err(err) => {
                if let TreeError::Timeout { limit } = &err {
                    warn!(?limit, elapsed = ?start.elapsed(), "bagged tree construction timed out");
                }
                return Err(err);
            }
        };

        info!(n_trees = trees.len(), elapsed = ?start.elapsed(), "bagged trees ready");
        Ok(BaggedTrees { trees })
    }
}

impl<L: Ord + Clone> BaggedTrees<L> {
    /// Majority vote across all trees, lowest label on ties.
    ///
    /// Only an ensemble assembled without validation can fail here, with
    /// [`TreeError::MalformedModel`].
    pub fn vote<E, X>(&self, example: &E, resolver: &X) -> Result<L>
    where
        E: ?Sized,
        X: ExampleResolver<E> + ?Sized,
    {
        let tally: LabelTally<&L> = self
            .trees
            .iter()
            .map(|tree| tree.classify(example, resolver))
            .collect::<Result<_>>()?;
        tally
            .majority()
            .map(|label| (*label).clone())
            .ok_or_else(|| TreeError::MalformedModel("ensemble has no trees".into()))
    }

    /// Each tree's vote, in ensemble order.
    pub fn all_votes<E, X>(&self, example: &E, resolver: &X) -> Result<Vec<L>>
    where
        E: ?Sized,
        X: ExampleResolver<E> + ?Sized,
    {
        self.trees
            .iter()
            .map(|tree| tree.classify(example, resolver).cloned())
            .collect()
    }
}

impl<L> BaggedTrees<L> {
    /// Assembles an ensemble from already-trained trees.
    pub fn from_trees(trees: Vec<DecisionTree<L>>) -> Result<Self> {
        let ensemble = BaggedTrees { trees };
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree<L>] {
        &self.trees
    }

    /// Depth of the deepest tree.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(TreeError::MalformedModel("ensemble has no trees".into()));
        }
        self.trees.iter().try_for_each(DecisionTree::validate)
    }
}
