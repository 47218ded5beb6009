//! Python bindings. Feature types and labels are strings; examples are dicts
//! mapping feature ids to `bool | int | float | str` values.

use std::collections::{BTreeMap, BTreeSet};

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTimeoutError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyLong, PyList, PyString};

use crate::common_types::{FeatureId, LabeledExample, Value};
use crate::error::TreeError;
use crate::features::FeatureCatalog;
use crate::parallelism::Parallelism;
use crate::trees::bagged::{BaggedTrees, BaggingConfig};

impl From<TreeError> for PyErr {
    fn from(err: TreeError) -> PyErr {
        match err {
            TreeError::UnknownFeature(_) => PyKeyError::new_err(err.to_string()),
            TreeError::Timeout { .. } => PyTimeoutError::new_err(err.to_string()),
            TreeError::Io(_) | TreeError::ThreadPool(_) => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

fn value_from_py(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    // bool is a subclass of int in Python, so it has to be tested first.
    if let Ok(b) = obj.downcast::<PyBool>() {
        return Ok(Value::Bool(b.is_true()));
    }
    if obj.is_instance_of::<PyLong>() {
        return Ok(Value::Int(obj.extract::<i64>()?));
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(Value::from(obj.extract::<f64>()?));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(Value::Str(obj.extract::<String>()?));
    }
    Err(PyTypeError::new_err(
        "feature values must be bool, int, float or str",
    ))
}

/// Sparse example: ids absent from the dict resolve to `False`.
type SparseExample = BTreeMap<FeatureId, Value>;

fn example_from_py(dict: &Bound<'_, PyDict>) -> PyResult<SparseExample> {
    let mut example = SparseExample::new();
    for (key, value) in dict.iter() {
        example.insert(key.extract::<FeatureId>()?, value_from_py(&value)?);
    }
    Ok(example)
}

fn resolve_sparse(example: &SparseExample, feature: FeatureId) -> Value {
    example.get(&feature).cloned().unwrap_or(Value::Bool(false))
}

#[pyclass(name = "FeatureCatalog")]
#[derive(Default)]
struct PyFeatureCatalog {
    inner: FeatureCatalog<String>,
}

#[pymethods]
impl PyFeatureCatalog {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, feature_type: String, value: &Bound<'_, PyAny>) -> PyResult<FeatureId> {
        Ok(self.inner.register(feature_type, value_from_py(value)?))
    }

    fn declare_domain(&mut self, feature_type: String, values: &Bound<'_, PyList>) -> PyResult<()> {
        let domain = values
            .iter()
            .map(|v| value_from_py(&v))
            .collect::<PyResult<Vec<Value>>>()?;
        self.inner.declare_domain(feature_type, domain);
        Ok(())
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Registered feature types, sorted.
    #[getter]
    fn feature_types(&self) -> Vec<String> {
        self.inner.feature_types().cloned().collect()
    }

    fn to_json(&self) -> PyResult<String> {
        Ok(self.inner.to_json()?)
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        Ok(PyFeatureCatalog {
            inner: FeatureCatalog::from_json(json)?,
        })
    }
}

#[pyclass(name = "BaggedTrees")]
struct PyBaggedTrees {
    inner: BaggedTrees<String>,
}

#[pymethods]
impl PyBaggedTrees {
    /// Trains on `examples`, a list of `(dict[int, value], str)` pairs.
    #[staticmethod]
    #[pyo3(signature = (catalog, examples, feature_types, n_trees = 10, tree_depth = 3, seed = 1992, n_threads = 1))]
    fn fit(
        py: Python<'_>,
        catalog: PyRef<'_, PyFeatureCatalog>,
        examples: &Bound<'_, PyList>,
        feature_types: Vec<String>,
        n_trees: usize,
        tree_depth: usize,
        seed: u64,
        n_threads: usize,
    ) -> PyResult<Self> {
        let mut training = Vec::with_capacity(examples.len());
        for item in examples.iter() {
            let (features, label): (Bound<'_, PyDict>, String) = item.extract()?;
            training.push(LabeledExample::new(example_from_py(&features)?, label));
        }

        let feature_types: BTreeSet<String> = feature_types.into_iter().collect();
        let config = BaggingConfig::new(n_trees, tree_depth)
            .with_seed(seed)
            .with_tree_parallelism(Parallelism::from_threads(n_threads));
        let registry = &catalog.inner;
        let inner = py.allow_threads(|| {
            BaggedTrees::fit(&training, &feature_types, registry, &resolve_sparse, &config)
        })?;
        Ok(PyBaggedTrees { inner })
    }

    fn vote(&self, features: &Bound<'_, PyDict>) -> PyResult<String> {
        let example = example_from_py(features)?;
        Ok(self.inner.vote(&example, &resolve_sparse)?)
    }

    fn all_votes(&self, features: &Bound<'_, PyDict>) -> PyResult<Vec<String>> {
        let example = example_from_py(features)?;
        Ok(self.inner.all_votes(&example, &resolve_sparse)?)
    }

    #[getter]
    fn n_trees(&self) -> usize {
        self.inner.n_trees()
    }

    #[getter]
    fn max_depth(&self) -> usize {
        self.inner.max_depth()
    }

    fn to_json(&self) -> PyResult<String> {
        Ok(self.inner.to_json()?)
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        Ok(PyBaggedTrees {
            inner: BaggedTrees::from_json(json)?,
        })
    }
}

#[pymodule]
fn opinion_forest(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFeatureCatalog>()?;
    m.add_class::<PyBaggedTrees>()?;
    Ok(())
}
