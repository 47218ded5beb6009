//! Decision-tree induction and bagged tree ensembles over enumerable features.
//!
//! Examples are opaque: trees only see them through a [`FeatureRegistry`], which
//! supplies the value domain behind each feature id, and an [`ExampleResolver`],
//! which reports the value an example exhibits for an id.
//!
//! ```
//! use std::collections::BTreeSet;
//! use opinion_forest::{BaggedTrees, BaggingConfig, FeatureCatalog, FeatureId, LabeledExample, Value};
//!
//! let mut catalog = FeatureCatalog::new();
//! catalog.declare_domain("contains", [true, false]);
//! let great = catalog.register("contains", "great");
//!
//! let sentences = ["a great film", "great acting", "the plot", "the end"];
//! let examples: Vec<_> = sentences
//!     .iter()
//!     .map(|s| LabeledExample::new(*s, s.contains("great")))
//!     .collect();
//! let contains = |s: &&str, id: FeatureId| {
//!     let word = catalog.value_for(id).map(|v| v.to_string()).unwrap_or_default();
//!     Value::Bool(s.split(' ').any(|w| w == word))
//! };
//!
//! let config = BaggingConfig::new(5, 1);
//! let forest = BaggedTrees::fit(&examples, &BTreeSet::from(["contains"]), &catalog, &contains, &config).unwrap();
//! assert_eq!(forest.vote(&"great news", &contains).unwrap(), true);
//! assert_eq!(forest.all_votes(&"great news", &contains).unwrap().len(), 5);
//! # let _ = great;
//! ```

pub mod common_types;
pub mod error;
pub mod features;
pub mod parallelism;
#[cfg(feature = "serde")]
pub mod persist;
#[cfg(feature = "python")]
mod python;
pub mod sampling;
pub mod tally;
pub mod trees;

pub use common_types::{FeatureId, LabeledExample, Value};
pub use error::{Result, TreeError};
pub use features::{ExampleResolver, FeatureCatalog, FeatureRegistry};
pub use parallelism::{Deadline, Parallelism};
pub use sampling::{SamplePlan, Sampler, SamplingStrategy};
pub use tally::LabelTally;
pub use trees::{BaggedTrees, BaggingConfig, DecisionTree, Node, TreeOptions};
