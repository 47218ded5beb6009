//! Decision tree classifier over enumerable feature domains.
//!
//! Trees are grown top-down. Each internal node branches on one feature id and
//! carries a child for every value in that feature's domain, including values no
//! training example exhibited.

use std::collections::{BTreeMap, BTreeSet};

use rayon::ThreadPool;
use tracing::{debug, trace, warn};

use crate::common_types::{FeatureId, LabeledExample, Value};
use crate::error::{Result, TreeError};
use crate::features::{ExampleResolver, FeatureRegistry};
use crate::parallelism::{Deadline, Parallelism};
use crate::tally::LabelTally;
use crate::trees::split::{self, FeatureSelection};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node<L> {
    Leaf {
        label: L,
    },
    Internal {
        feature: FeatureId,
        #[cfg_attr(feature = "serde", serde(with = "crate::persist::branch_pairs"))]
        children: BTreeMap<Value, Node<L>>,
    },
}

impl<L> Node<L> {
    /// Routes an example down to a leaf.
    ///
    /// When the resolved value has no branch, its canonical string form is tried,
    /// then the lowest-keyed child is followed. The last step is a best effort for
    /// inputs outside the training domain.
    ///
    /// Fails with [`TreeError::MalformedModel`] on an internal node without
    /// branches, which built and validated trees never contain.
    pub fn classify<E, X>(&self, example: &E, resolver: &X) -> Result<&L>
    where
        E: ?Sized,
        X: ExampleResolver<E> + ?Sized,
    {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { label } => return Ok(label),
                Node::Internal { feature, children } => {
                    let value = resolver.value_of(example, *feature);
                    node = match children
                        .get(&value)
                        .or_else(|| children.get(&value.canonical()))
                    {
                        Some(child) => child,
                        None => {
                            trace!(feature, %value, "value outside branch domain, following first branch");
                            children.values().next().ok_or_else(|| branchless(*feature))?
                        }
                    };
                }
            }
        }
    }

    /// 0 for a leaf, otherwise one more than the deepest child.
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { children, .. } => {
                1 + children.values().map(Node::depth).max().unwrap_or(0)
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { children, .. } => children.values().map(Node::n_leaves).sum(),
        }
    }

    /// Checks that every internal node has at least one branch.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Node::Internal { feature, children } = self {
            if children.is_empty() {
                return Err(branchless(*feature));
            }
            for child in children.values() {
                child.validate()?;
            }
        }
        Ok(())
    }
}

fn branchless(feature: FeatureId) -> TreeError {
    TreeError::MalformedModel(format!("internal node on feature {} has no branches", feature))
}

/// Construction parameters for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
    pub max_depth: usize,
    /// Pool used to score candidate features at each split.
    pub split_parallelism: Parallelism,
    pub deadline: Option<Deadline>,
}

impl TreeOptions {
    pub fn new(max_depth: usize) -> Self {
        TreeOptions {
            max_depth,
            split_parallelism: Parallelism::Sequential,
            deadline: None,
        }
    }

    pub fn with_split_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.split_parallelism = parallelism;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A trained decision tree. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionTree<L> {
    root: Node<L>,
    max_depth: usize,
}

impl<L> DecisionTree<L>
where
    L: Ord + Clone + Send + Sync,
{
    /// Grows a tree from `examples` using the features in `candidates`.
    ///
    /// Fails on an empty example set and on feature ids the registry does not know.
    pub fn build<E, R, X>(
        examples: &[LabeledExample<E, L>],
        candidates: &BTreeSet<FeatureId>,
        max_depth: usize,
        registry: &R,
        resolver: &X,
    ) -> Result<Self>
    where
        E: Sync,
        R: FeatureRegistry + Sync + ?Sized,
        X: ExampleResolver<E> + Sync + ?Sized,
    {
        Self::build_with(examples, candidates, registry, resolver, TreeOptions::new(max_depth))
    }

    /// Builds with explicit options. A parallel `split_parallelism` gets its own
    /// pool for the duration of this call.
    pub fn build_with<E, R, X>(
        examples: &[LabeledExample<E, L>],
        candidates: &BTreeSet<FeatureId>,
        registry: &R,
        resolver: &X,
        options: TreeOptions,
    ) -> Result<Self>
    where
        E: Sync,
        R: FeatureRegistry + Sync + ?Sized,
        X: ExampleResolver<E> + Sync + ?Sized,
    {
        let refs: Vec<&LabeledExample<E, L>> = examples.iter().collect();
        let split_pool = options.split_parallelism.pool()?;
        Self::build_from_refs(&refs, candidates, registry, resolver, options, split_pool.as_ref())
    }

    /// Same as [`DecisionTree::build_with`] over borrowed examples, which may
    /// repeat. Candidates are scored on `split_pool` when one is given, otherwise
    /// on the calling thread; `options.split_parallelism` is not consulted.
    pub(crate) fn build_from_refs<E, R, X>(
        examples: &[&LabeledExample<E, L>],
        candidates: &BTreeSet<FeatureId>,
        registry: &R,
        resolver: &X,
        options: TreeOptions,
        split_pool: Option<&ThreadPool>,
    ) -> Result<Self>
    where
        E: Sync,
        R: FeatureRegistry + Sync + ?Sized,
        X: ExampleResolver<E> + Sync + ?Sized,
    {
        let grower = Grower {
            registry,
            resolver,
            parallel: split_pool.is_some(),
            deadline: options.deadline,
        };
        let root = match split_pool {
            Some(pool) => pool.install(|| grower.grow(examples, candidates, options.max_depth))?,
            None => grower.grow(examples, candidates, options.max_depth)?,
        };
        Ok(DecisionTree {
            root,
            max_depth: options.max_depth,
        })
    }
}

impl<L> DecisionTree<L> {
    /// Wraps an existing root, e.g. one assembled by hand or loaded from storage.
    pub fn from_root(root: Node<L>, max_depth: usize) -> Result<Self> {
        root.validate()?;
        Ok(DecisionTree { root, max_depth })
    }

    pub fn classify<E, X>(&self, example: &E, resolver: &X) -> Result<&L>
    where
        E: ?Sized,
        X: ExampleResolver<E> + ?Sized,
    {
        self.root.classify(example, resolver)
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Depth limit the tree was built with; `depth() <= max_depth()`.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn n_leaves(&self) -> usize {
        self.root.n_leaves()
    }

    pub fn root(&self) -> &Node<L> {
        &self.root
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.root.validate()
    }
}

struct Grower<'a, R: ?Sized, X: ?Sized> {
    registry: &'a R,
    resolver: &'a X,
    parallel: bool,
    deadline: Option<Deadline>,
}

impl<R, X> Grower<'_, R, X>
where
    R: FeatureRegistry + Sync + ?Sized,
    X: ?Sized,
{
    fn grow<E, L>(
        &self,
        examples: &[&LabeledExample<E, L>],
        candidates: &BTreeSet<FeatureId>,
        depth_left: usize,
    ) -> Result<Node<L>>
    where
        E: Sync,
        L: Ord + Clone + Sync,
        X: ExampleResolver<E> + Sync,
    {
        if let Some(deadline) = &self.deadline {
            deadline.check()?;
        }

        let tally: LabelTally<&L> = examples.iter().map(|e| &e.label).collect();
        let majority = match tally.majority() {
            Some(label) => (*label).clone(),
            None => return Err(TreeError::EmptyExamples),
        };

        if tally.distinct() == 1 || depth_left == 0 || candidates.is_empty() {
            return Ok(Node::Leaf { label: majority });
        }

        let scores = split::score_candidates(
            examples,
            candidates,
            self.registry,
            self.resolver,
            self.parallel,
            self.deadline.as_ref(),
        )?;
        let feature = match split::select_feature(&scores) {
            Some(FeatureSelection::Best { feature, gain }) => {
                debug!(
                    feature,
                    gain,
                    error = tally.majority_error::<f64>(),
                    n_examples = examples.len(),
                    depth_left,
                    "split chosen"
                );
                feature
            }
            Some(FeatureSelection::Fallback(feature)) => {
                warn!(feature, n_candidates = candidates.len(), "no candidate produced a gain, splitting on lowest id");
                feature
            }
            None => return Ok(Node::Leaf { label: majority }),
        };

        let domain = self.registry.domain_of(feature)?;
        if domain.is_empty() {
            return Ok(Node::Leaf { label: majority });
        }

        let mut remaining = candidates.clone();
        remaining.remove(&feature);

        let mut children = BTreeMap::new();
        for (value, subset) in split::partition(examples, feature, domain, self.resolver, self.deadline.as_ref())? {
            let child = if subset.is_empty() {
                Node::Leaf {
                    label: majority.clone(),
                }
            } else {
                self.grow(&subset, &remaining, depth_left - 1)?
            };
            children.insert(value, child);
        }

        Ok(Node::Internal { feature, children })
    }
}
