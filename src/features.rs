//! Feature registry and example resolver contracts, plus the in-memory catalog.
//!
//! Tree construction never inspects an example directly. It asks a
//! [`FeatureRegistry`] for the enumerable domain behind a feature id and an
//! [`ExampleResolver`] for the value an example exhibits for that id.

use std::collections::{BTreeMap, BTreeSet};

use crate::common_types::{FeatureId, Value};
use crate::error::{Result, TreeError};

/// Maps feature ids to their value domains and feature types to their ids.
///
/// Implementations are read concurrently while trees are built, so lookups take
/// `&self` only.
pub trait FeatureRegistry {
    type FeatureType: Ord;

    /// Complete domain of the feature type that owns `id`.
    ///
    /// An unknown id means the registry and the model disagree; this is fatal.
    fn domain_of(&self, id: FeatureId) -> Result<&BTreeSet<Value>>;

    /// All ids registered under any of `feature_types`.
    fn ids_for(&self, feature_types: &BTreeSet<Self::FeatureType>) -> BTreeSet<FeatureId>;
}

/// Resolves the value an example exhibits for a feature id.
pub trait ExampleResolver<E: ?Sized> {
    fn value_of(&self, example: &E, feature: FeatureId) -> Value;
}

impl<E, F> ExampleResolver<E> for F
where
    E: ?Sized,
    F: Fn(&E, FeatureId) -> Value,
{
    fn value_of(&self, example: &E, feature: FeatureId) -> Value {
        self(example, feature)
    }
}

/// One registered `(feature type, value)` pair. Its id is its index in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry<T> {
    pub feature_type: T,
    pub value: Value,
}

/// In-memory [`FeatureRegistry`] that allocates ids on first sight.
///
/// Ids are allocated sequentially from zero and never reused. Registration takes
/// `&mut self`, so it cannot overlap with tree construction, which only borrows
/// the catalog immutably; allocate every id in a pre-pass before training.
#[derive(Debug, Clone)]
pub struct FeatureCatalog<T: Ord> {
    pub(crate) entries: Vec<FeatureEntry<T>>,
    pub(crate) fixed_domains: BTreeMap<T, BTreeSet<Value>>,
    ids_by_type: BTreeMap<T, BTreeMap<Value, FeatureId>>,
    observed_domains: BTreeMap<T, BTreeSet<Value>>,
}

impl<T: Ord> Default for FeatureCatalog<T> {
    fn default() -> Self {
        FeatureCatalog {
            entries: Vec::new(),
            fixed_domains: BTreeMap::new(),
            ids_by_type: BTreeMap::new(),
            observed_domains: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Clone> FeatureCatalog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a catalog from its entries (in id order) and fixed domains.
    pub(crate) fn from_parts(
        entries: Vec<FeatureEntry<T>>,
        fixed_domains: BTreeMap<T, BTreeSet<Value>>,
    ) -> Self {
        let mut catalog = FeatureCatalog {
            entries: Vec::with_capacity(entries.len()),
            fixed_domains,
            ..Self::default()
        };
        for entry in entries {
            catalog.register(entry.feature_type, entry.value);
        }
        catalog
    }

    /// Returns the id for `(feature_type, value)`, allocating one on first sight.
    ///
    /// The value also joins the observed domain of `feature_type`.
    pub fn register(&mut self, feature_type: T, value: impl Into<Value>) -> FeatureId {
        let value = value.into();
        if let Some(id) = self
            .ids_by_type
            .get(&feature_type)
            .and_then(|ids| ids.get(&value))
        {
            return *id;
        }

        let id = self.entries.len() as FeatureId;
        self.ids_by_type
            .entry(feature_type.clone())
            .or_default()
            .insert(value.clone(), id);
        self.observed_domains
            .entry(feature_type.clone())
            .or_default()
            .insert(value.clone());
        self.entries.push(FeatureEntry {
            feature_type,
            value,
        });
        id
    }

    /// Fixes the enumerable domain of `feature_type`.
    ///
    /// A fixed domain replaces the observed one for every id of that type. Use it
    /// for indicator features, where the id names the thing tested for (a unigram)
    /// and the domain is the outcome of the test (`{true, false}`).
    pub fn declare_domain<I, V>(&mut self, feature_type: T, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.fixed_domains
            .insert(feature_type, values.into_iter().map(Into::into).collect());
    }

    /// Looks up an id without allocating.
    pub fn id_of(&self, feature_type: &T, value: &Value) -> Option<FeatureId> {
        self.ids_by_type.get(feature_type)?.get(value).copied()
    }

    pub fn feature_type_of(&self, id: FeatureId) -> Result<&T> {
        self.entry(id).map(|e| &e.feature_type)
    }

    /// The value the id was registered for (e.g. the unigram itself).
    pub fn value_for(&self, id: FeatureId) -> Result<&Value> {
        self.entry(id).map(|e| &e.value)
    }

    pub fn feature_types(&self) -> impl Iterator<Item = &T> {
        self.ids_by_type.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: FeatureId) -> Result<&FeatureEntry<T>> {
        self.entries
            .get(id as usize)
            .ok_or(TreeError::UnknownFeature(id))
    }
}

impl<T: Ord + Clone> FeatureRegistry for FeatureCatalog<T> {
    type FeatureType = T;

    fn domain_of(&self, id: FeatureId) -> Result<&BTreeSet<Value>> {
        let feature_type = self.feature_type_of(id)?;
        self.fixed_domains
            .get(feature_type)
            .or_else(|| self.observed_domains.get(feature_type))
            .ok_or(TreeError::UnknownFeature(id))
    }

    fn ids_for(&self, feature_types: &BTreeSet<T>) -> BTreeSet<FeatureId> {
        feature_types
            .iter()
            .filter_map(|t| self.ids_by_type.get(t))
            .flat_map(|ids| ids.values().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Kind {
        ContainsUnigram,
        ThisPos,
    }

    #[test]
    fn test_register_is_stable() {
        let mut catalog = FeatureCatalog::new();
        let a = catalog.register(Kind::ThisPos, "NN");
        let b = catalog.register(Kind::ThisPos, "VB");
        let again = catalog.register(Kind::ThisPos, "NN");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(again, a);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.value_for(b).unwrap(), &Value::from("VB"));
        assert_eq!(catalog.feature_type_of(a).unwrap(), &Kind::ThisPos);
    }

    #[test]
    fn test_observed_domain_is_shared_by_type() {
        let mut catalog = FeatureCatalog::new();
        let nn = catalog.register(Kind::ThisPos, "NN");
        catalog.register(Kind::ThisPos, "JJ");
        let domain = catalog.domain_of(nn).unwrap();
        assert_eq!(domain.len(), 2);
        assert!(domain.contains(&Value::from("JJ")));
    }

    #[test]
    fn test_fixed_domain_wins() {
        let mut catalog = FeatureCatalog::new();
        catalog.declare_domain(Kind::ContainsUnigram, [true, false]);
        let good = catalog.register(Kind::ContainsUnigram, "good");
        catalog.register(Kind::ContainsUnigram, "bad");
        let domain = catalog.domain_of(good).unwrap();
        assert_eq!(
            domain.iter().cloned().collect::<Vec<_>>(),
            vec![Value::Bool(false), Value::Bool(true)]
        );
    }

    #[test]
    fn test_unknown_id_fails() {
        let catalog: FeatureCatalog<Kind> = FeatureCatalog::new();
        assert!(matches!(
            catalog.domain_of(3),
            Err(TreeError::UnknownFeature(3))
        ));
        assert!(catalog.value_for(0).is_err());
    }

    #[test]
    fn test_ids_for_types() {
        let mut catalog = FeatureCatalog::new();
        let u = catalog.register(Kind::ContainsUnigram, "good");
        let p = catalog.register(Kind::ThisPos, "NN");
        let only_unigrams = catalog.ids_for(&BTreeSet::from([Kind::ContainsUnigram]));
        assert_eq!(only_unigrams, BTreeSet::from([u]));
        let both = catalog.ids_for(&BTreeSet::from([Kind::ContainsUnigram, Kind::ThisPos]));
        assert_eq!(both, BTreeSet::from([u, p]));
    }

    #[test]
    fn test_from_parts_preserves_ids() {
        let mut catalog = FeatureCatalog::new();
        catalog.register(Kind::ThisPos, "NN");
        catalog.register(Kind::ContainsUnigram, "good");
        let rebuilt = FeatureCatalog::from_parts(catalog.entries.clone(), BTreeMap::new());
        assert_eq!(rebuilt.id_of(&Kind::ContainsUnigram, &Value::from("good")), Some(1));
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |example: &Vec<bool>, id: FeatureId| Value::Bool(example[id as usize]);
        assert_eq!(resolver.value_of(&vec![false, true], 1), Value::Bool(true));
    }
}
