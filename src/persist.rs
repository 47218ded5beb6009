//! JSON persistence for trained ensembles and feature catalogs.
//!
//! A saved ensemble is only meaningful next to the catalog it was trained
//! against: feature ids are stored, not the pairs they denote.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common_types::Value;
use crate::error::{Result, TreeError};
use crate::features::{FeatureCatalog, FeatureEntry};
use crate::trees::bagged::BaggedTrees;

/// Serializes a map as a sequence of `(key, value)` pairs.
///
/// JSON objects only take string keys; branch maps are keyed by [`Value`].
pub(crate) mod branch_pairs {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
    {
        let pairs: Vec<(K, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

impl<L> BaggedTrees<L>
where
    L: Serialize + DeserializeOwned,
{
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses an ensemble and checks it is usable: at least one tree, and a
    /// branch under every internal node.
    pub fn from_json(json: &str) -> Result<Self> {
        let ensemble: BaggedTrees<L> = serde_json::from_str(json)?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[derive(Serialize)]
struct CatalogRecordRef<'a, T> {
    entries: Vec<EntryRecordRef<'a, T>>,
    fixed_domains: Vec<(&'a T, &'a BTreeSet<Value>)>,
}

#[derive(Serialize)]
struct EntryRecordRef<'a, T> {
    feature_type: &'a T,
    value: &'a Value,
}

#[derive(Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
struct CatalogRecord<T> {
    entries: Vec<EntryRecord<T>>,
    #[serde(default)]
    fixed_domains: Vec<(T, BTreeSet<Value>)>,
}

#[derive(Deserialize)]
struct EntryRecord<T> {
    feature_type: T,
    value: Value,
}

impl<T: Ord + Serialize> Serialize for FeatureCatalog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CatalogRecordRef {
            entries: self
                .entries
                .iter()
                .map(|e| EntryRecordRef {
                    feature_type: &e.feature_type,
                    value: &e.value,
                })
                .collect(),
            fixed_domains: self.fixed_domains.iter().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: Ord + Clone + Deserialize<'de>> Deserialize<'de> for FeatureCatalog<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = CatalogRecord::<T>::deserialize(deserializer)?;
        let n_entries = record.entries.len();
        let entries = record
            .entries
            .into_iter()
            .map(|e| FeatureEntry {
                feature_type: e.feature_type,
                value: e.value,
            })
            .collect();
        let fixed_domains: BTreeMap<T, BTreeSet<Value>> = record.fixed_domains.into_iter().collect();

        let catalog = FeatureCatalog::from_parts(entries, fixed_domains);
        if catalog.len() != n_entries {
            return Err(serde::de::Error::custom(
                "duplicate (feature type, value) entries would shift feature ids",
            ));
        }
        Ok(catalog)
    }
}

impl<T> FeatureCatalog<T>
where
    T: Ord + Clone + Serialize + DeserializeOwned,
{
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Loads a saved catalog, or starts an empty one if `path` does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(TreeError::Io(e)),
        }
    }
}
