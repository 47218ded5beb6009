//! This module contains the data types shared by the tree learners and the feature registry.

use std::fmt;

use ordered_float::OrderedFloat;

/// Stable integer handle for one `(feature type, value)` pair.
pub type FeatureId = u32;

/// A concrete feature value.
///
/// The variant order is part of the total order: booleans sort before integers,
/// integers before floats, floats before strings. Branch maps in trained trees are
/// keyed by this order, so the "lowest-keyed" fallback child is well defined.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Value {
    /// Returns the string form of this value.
    ///
    /// Used when a value resolved at inference time is typed differently from the
    /// one recorded at training time (e.g. `Bool(true)` vs `Str("true")`).
    pub fn canonical(&self) -> Value {
        match self {
            Value::Str(_) => self.clone(),
            other => Value::Str(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x.0),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(OrderedFloat(x))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Represents a single training example: an opaque example and its label.
///
/// - `E`: The example type (a sentence, a document, an index into a corpus).
/// - `L`: The label type (e.g., `bool`, `i32`, `String`, an enum).
#[derive(Debug, Clone)]
pub struct LabeledExample<E, L> {
    pub example: E,
    pub label: L,
}

impl<E, L> LabeledExample<E, L> {
    pub fn new(example: E, label: L) -> Self {
        LabeledExample { example, label }
    }
}
