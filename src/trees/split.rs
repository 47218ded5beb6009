//! Majority-error split scoring.
//!
//! `gain(f) = majErr(S) - Σ_v (|S_v| / |S|) * majErr(S_v)` where `S_v` ranges over
//! the subsets induced by every value in `f`'s domain. Examples whose value lies
//! outside the domain belong to no subset.

use std::collections::{BTreeMap, BTreeSet};

use num_traits::{Float, FromPrimitive};
use rayon::prelude::*;

use crate::common_types::{FeatureId, LabeledExample, Value};
use crate::error::Result;
use crate::features::{ExampleResolver, FeatureRegistry};
use crate::parallelism::Deadline;
use crate::tally::LabelTally;

/// Outcome of choosing a feature to split on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureSelection<F> {
    /// Strictly greatest gain, lowest id among equals.
    Best { feature: FeatureId, gain: F },
    /// No candidate produced a gain; the lowest-id candidate is used as is.
    Fallback(FeatureId),
}

impl<F> FeatureSelection<F> {
    pub fn feature(&self) -> FeatureId {
        match self {
            FeatureSelection::Best { feature, .. } => *feature,
            FeatureSelection::Fallback(feature) => *feature,
        }
    }
}

fn label_tally<'a, E, L: Ord>(examples: &[&'a LabeledExample<E, L>]) -> LabelTally<&'a L> {
    examples.iter().map(|e| &e.label).collect()
}

fn check(deadline: Option<&Deadline>) -> Result<()> {
    deadline.map_or(Ok(()), Deadline::check)
}

/// Groups examples by their value for `feature`, one group per domain value.
///
/// Every domain value gets an entry, possibly empty. The deadline is checked
/// before each example is resolved.
pub fn partition<'a, E, L, X>(
    examples: &[&'a LabeledExample<E, L>],
    feature: FeatureId,
    domain: &BTreeSet<Value>,
    resolver: &X,
    deadline: Option<&Deadline>,
) -> Result<BTreeMap<Value, Vec<&'a LabeledExample<E, L>>>>
where
    X: ExampleResolver<E> + ?Sized,
{
    let mut groups: BTreeMap<Value, Vec<&'a LabeledExample<E, L>>> =
        domain.iter().map(|v| (v.clone(), Vec::new())).collect();
    for example in examples {
        check(deadline)?;
        let value = resolver.value_of(&example.example, feature);
        if let Some(group) = groups.get_mut(&value) {
            group.push(*example);
        }
    }
    Ok(groups)
}

/// Majority-error gain of splitting `examples` on `feature`.
///
/// Equal to `majErr(S) - Σ_v (|S_v| / |S|) * majErr(S_v)`, see
/// [`LabelTally::majority_error`].
///
/// `None` when the feature's domain is empty, so no split exists.
pub fn score_feature<F, E, L, R, X>(
    examples: &[&LabeledExample<E, L>],
    feature: FeatureId,
    registry: &R,
    resolver: &X,
    deadline: Option<&Deadline>,
) -> Result<Option<F>>
where
    F: Float + FromPrimitive,
    L: Ord,
    R: FeatureRegistry + ?Sized,
    X: ExampleResolver<E> + ?Sized,
{
    let domain = registry.domain_of(feature)?;
    if domain.is_empty() || examples.is_empty() {
        return Ok(None);
    }

    // Σ (|S_v| / |S|) * majErr(S_v) reduces to Σ wrong(S_v) / |S|. Summing the
    // integer counts first keeps equal gains bit-identical for the tie-break.
    let parent_wrong = label_tally(examples).minority_count();
    let child_wrong: usize = partition(examples, feature, domain, resolver, deadline)?
        .values()
        .map(|subset| label_tally(subset).minority_count())
        .sum();

    let total = F::from_usize(examples.len()).unwrap_or_else(F::one);
    let parent_wrong = F::from_usize(parent_wrong).unwrap_or_else(F::zero);
    let child_wrong = F::from_usize(child_wrong).unwrap_or_else(F::zero);
    Ok(Some((parent_wrong - child_wrong) / total))
}

/// Scores every candidate, serially or on the current rayon pool.
///
/// All scores are collected, keyed by id, before anything is compared. An
/// expired deadline stops the scan at the next candidate or example.
pub fn score_candidates<E, L, R, X>(
    examples: &[&LabeledExample<E, L>],
    candidates: &BTreeSet<FeatureId>,
    registry: &R,
    resolver: &X,
    parallel: bool,
    deadline: Option<&Deadline>,
) -> Result<BTreeMap<FeatureId, Option<f64>>>
where
    E: Sync,
    L: Ord + Sync,
    R: FeatureRegistry + Sync + ?Sized,
    X: ExampleResolver<E> + Sync + ?Sized,
{
    let score = |&f: &FeatureId| -> Result<(FeatureId, Option<f64>)> {
        check(deadline)?;
        score_feature(examples, f, registry, resolver, deadline).map(|gain| (f, gain))
    };
    if parallel {
        candidates.par_iter().map(score).collect()
    } else {
        candidates.iter().map(score).collect()
    }
}

/// Picks the feature with the strictly greatest gain, scanning ids in ascending order.
///
/// A later feature with an equal gain never replaces an earlier one. Returns
/// `None` only when there are no candidates at all.
pub fn select_feature<F: Float>(scores: &BTreeMap<FeatureId, Option<F>>) -> Option<FeatureSelection<F>> {
    let mut best: Option<(FeatureId, F)> = None;
    for (&feature, score) in scores {
        let Some(gain) = *score else { continue };
        if gain.is_nan() {
            continue;
        }
        match best {
            Some((_, best_gain)) if gain <= best_gain => {}
            _ => best = Some((feature, gain)),
        }
    }

    match best {
        Some((feature, gain)) => Some(FeatureSelection::Best { feature, gain }),
        None => scores.keys().next().map(|&f| FeatureSelection::Fallback(f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureCatalog;

    fn fixture() -> (Vec<LabeledExample<[bool; 3], bool>>, FeatureCatalog<&'static str>) {
        // f0 separates the labels, f1 is noise, f2 duplicates f0.
        let examples = vec![
            LabeledExample::new([true, true, true], true),
            LabeledExample::new([true, false, true], true),
            LabeledExample::new([false, true, false], false),
            LabeledExample::new([false, false, false], false),
        ];
        let mut catalog = FeatureCatalog::new();
        catalog.declare_domain("flag", [true, false]);
        for name in ["f0", "f1", "f2"] {
            catalog.register("flag", name);
        }
        (examples, catalog)
    }

    fn resolve(example: &[bool; 3], id: FeatureId) -> Value {
        Value::Bool(example[id as usize])
    }

    #[test]
    fn test_partition_covers_domain() {
        let (examples, catalog) = fixture();
        let refs: Vec<_> = examples.iter().collect();
        let domain = catalog.domain_of(0).unwrap();
        let groups = partition(&refs, 0, domain, &resolve, None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&Value::Bool(true)].len(), 2);
        assert_eq!(groups[&Value::Bool(false)].len(), 2);
    }

    #[test]
    fn test_score_feature() {
        let (examples, catalog) = fixture();
        let refs: Vec<_> = examples.iter().collect();
        let perfect: f64 = score_feature(&refs, 0, &catalog, &resolve, None).unwrap().unwrap();
        let noise: f64 = score_feature(&refs, 1, &catalog, &resolve, None).unwrap().unwrap();
        assert_eq!(perfect, 0.5);
        assert_eq!(noise, 0.0);

        let refs_tally: LabelTally<&bool> = refs.iter().map(|e| &e.label).collect();
        let parent: f64 = refs_tally.majority_error();
        assert_eq!(perfect, parent);
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let (examples, catalog) = fixture();
        let refs: Vec<_> = examples.iter().collect();
        let candidates = BTreeSet::from([2, 1, 0]);
        for parallel in [false, true] {
            let scores = score_candidates(&refs, &candidates, &catalog, &resolve, parallel, None).unwrap();
            assert_eq!(scores[&0], scores[&2]);
            assert_eq!(
                select_feature(&scores),
                Some(FeatureSelection::Best { feature: 0, gain: 0.5 })
            );
        }
    }

    #[test]
    fn test_select_feature_fallback() {
        let scores: BTreeMap<FeatureId, Option<f64>> = BTreeMap::from([(4, None), (9, None)]);
        assert_eq!(select_feature(&scores), Some(FeatureSelection::Fallback(4)));
        assert_eq!(select_feature::<f64>(&BTreeMap::new()), None);
    }

    #[test]
    fn test_unknown_feature_propagates() {
        let (examples, catalog) = fixture();
        let refs: Vec<_> = examples.iter().collect();
        let result = score_candidates(&refs, &BTreeSet::from([0, 42]), &catalog, &resolve, false, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_expired_deadline_stops_scoring_before_resolving() {
        let (examples, catalog) = fixture();
        let refs: Vec<_> = examples.iter().collect();
        let resolved = std::sync::atomic::AtomicUsize::new(0);
        let counting = |e: &[bool; 3], id: FeatureId| {
            resolved.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            resolve(e, id)
        };
        let expired = Deadline::after(std::time::Duration::ZERO);
        for parallel in [false, true] {
            let result = score_candidates(&refs, &BTreeSet::from([0, 1, 2]), &catalog, &counting, parallel, Some(&expired));
            assert!(matches!(result, Err(crate::error::TreeError::Timeout { .. })));
        }
        let domain = catalog.domain_of(0).unwrap();
        assert!(partition(&refs, 0, domain, &counting, Some(&expired)).is_err());
        assert_eq!(resolved.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
