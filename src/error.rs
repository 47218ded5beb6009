//! Error types for tree induction, ensemble construction and persistence.

use std::time::Duration;

use thiserror::Error;

use crate::common_types::FeatureId;

/// Errors raised while building, loading or querying tree models.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("cannot build a tree from an empty example set")]
    EmptyExamples,

    #[error("feature universe resolved to no feature ids")]
    EmptyFeatureUniverse,

    #[error("no feature registered for id {0}")]
    UnknownFeature(FeatureId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("ensemble construction exceeded its timeout of {limit:?}")]
    Timeout { limit: Duration },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("malformed model: {0}")]
    MalformedModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_error_display() {
        let err = TreeError::UnknownFeature(17);
        assert!(format!("{}", err).contains("17"));

        let err = TreeError::Timeout {
            limit: Duration::from_millis(250),
        };
        assert!(format!("{}", err).contains("250ms"));

        let err = TreeError::InvalidConfig("n_trees must be > 0".to_string());
        assert!(format!("{}", err).contains("n_trees"));
    }
}
