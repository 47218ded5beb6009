//! Label counting with deterministic tie-breaking.

use std::collections::BTreeMap;

use num_traits::{Float, FromPrimitive};

/// Counts of labels, kept in label order.
///
/// Iterating in label order is what makes [`LabelTally::majority`] deterministic:
/// only a strictly higher count replaces the current winner, so ties go to the
/// label that sorts first.
#[derive(Debug, Clone)]
pub struct LabelTally<L> {
    counts: BTreeMap<L, usize>,
    total: usize,
}

impl<L: Ord> Default for LabelTally<L> {
    fn default() -> Self {
        LabelTally {
            counts: BTreeMap::new(),
            total: 0,
        }
    }
}

impl<L: Ord> LabelTally<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: L) {
        *self.counts.entry(label).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// The most frequent label and its count; `None` for an empty tally.
    pub fn majority_entry(&self) -> Option<(&L, usize)> {
        let mut best: Option<(&L, usize)> = None;
        for (label, &count) in &self.counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }
        best
    }

    pub fn majority(&self) -> Option<&L> {
        self.majority_entry().map(|(label, _)| label)
    }

    /// Number of labels that disagree with the majority label.
    pub fn minority_count(&self) -> usize {
        self.majority_entry()
            .map_or(0, |(_, count)| self.total - count)
    }

    /// Fraction of the tallied labels that disagree with the majority label.
    ///
    /// An empty tally has zero error.
    pub fn majority_error<F: Float + FromPrimitive>(&self) -> F {
        if self.is_empty() {
            return F::zero();
        }
        let wrong = F::from_usize(self.minority_count()).unwrap_or_else(F::zero);
        let total = F::from_usize(self.total).unwrap_or_else(F::one);
        wrong / total
    }
}

impl<L: Ord> FromIterator<L> for LabelTally<L> {
    fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
        let mut tally = LabelTally::new();
        for label in iter {
            tally.add(label);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_picks_highest_count() {
        let tally: LabelTally<i32> = [3, 1, 3, 2, 3, 1].into_iter().collect();
        assert_eq!(tally.majority(), Some(&3));
        assert_eq!(tally.minority_count(), 3);
        assert_eq!(tally.total(), 6);
    }

    #[test]
    fn test_majority_tie_goes_to_lowest_label() {
        let tally: LabelTally<&str> = ["pos", "neg", "pos", "neg"].into_iter().collect();
        assert_eq!(tally.majority(), Some(&"neg"));

        let tally: LabelTally<bool> = [true, false].into_iter().collect();
        assert_eq!(tally.majority(), Some(&false));
    }

    #[test]
    fn test_empty_tally() {
        let tally: LabelTally<u8> = LabelTally::new();
        assert!(tally.is_empty());
        assert_eq!(tally.majority(), None);
        assert_eq!(tally.minority_count(), 0);
        assert_eq!(tally.majority_error::<f64>(), 0.0);
    }

    #[test]
    fn test_majority_error() {
        let tally: LabelTally<u8> = [1, 1, 1, 2].into_iter().collect();
        assert_eq!(tally.majority_error::<f64>(), 0.25);
        assert_eq!(tally.majority_error::<f32>(), 0.25);
    }
}
