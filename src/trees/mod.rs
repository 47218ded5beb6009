//! Tree learners: single decision trees and bagged ensembles of them.

pub mod bagged;
pub mod decision_tree;
pub mod split;

pub use bagged::{BaggedTrees, BaggingConfig};
pub use decision_tree::{DecisionTree, Node, TreeOptions};
pub use split::FeatureSelection;
