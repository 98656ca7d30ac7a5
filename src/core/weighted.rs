//! Weighted random selection
//!
//! Every random pick in the scheduler goes through here. Candidates with a
//! weight of zero or less (or a non-finite weight) are never chosen.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Pick an index with probability proportional to its weight.
///
/// Returns `None` when no weight is positive.
pub fn pick_index<R: Rng + ?Sized>(weights: &[f32], rng: &mut R) -> Option<usize> {
    let eligible: Vec<(usize, f32)> = weights
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .collect();

    match eligible.len() {
        0 => None,
        1 => Some(eligible[0].0),
        _ => {
            let dist = WeightedIndex::new(eligible.iter().map(|(_, w)| *w)).ok()?;
            Some(eligible[dist.sample(rng)].0)
        }
    }
}

/// Pick one item proportionally to the weights (parallel slices).
pub fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], weights: &[f32], rng: &mut R) -> Option<&'a T> {
    debug_assert_eq!(items.len(), weights.len());
    pick_index(weights, rng).and_then(|i| items.get(i))
}

/// Draw `k` indices with replacement.
pub fn pick_indices_with_replacement<R: Rng + ?Sized>(
    weights: &[f32],
    k: usize,
    rng: &mut R,
) -> Vec<usize> {
    (0..k).filter_map(|_| pick_index(weights, rng)).collect()
}
