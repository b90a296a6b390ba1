//! Row-sampling primitives shared by the ensemble estimators.
//!
//! Every routine draws from a caller-owned [`StdRng`] so that an estimator's
//! whole fit is reproducible from one numeric seed.

use crate::dtype::Float;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Resolve an optional seed to a concrete value, drawing one from the
/// thread RNG when absent. Called once at estimator construction.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Draw `n` indices uniformly with replacement from `0..n`.
pub fn bootstrap_indices(rng: &mut StdRng, n: usize) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

/// Draw `k` distinct indices from `0..n` (all of them when `k >= n`).
pub fn sample_without_replacement(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let amount = k.min(n);
    let (picked, _) = indices.partial_shuffle(rng, amount);
    picked.to_vec()
}

/// Draw `n_draws` indices from a weighted distribution via the cumulative-sum
/// inverse-CDF method. Weights must be non-negative with a positive total.
pub fn weighted_indices<T: Float>(rng: &mut StdRng, weights: &[T], n_draws: usize) -> Vec<usize> {
    let mut cumulative = Vec::with_capacity(weights.len());
    let mut total = T::ZERO;
    for &w in weights {
        total += w;
        cumulative.push(total);
    }
    debug_assert!(total > T::ZERO, "weighted_indices requires a positive weight total");

    let n = weights.len();
    (0..n_draws)
        .map(|_| {
            let u = T::from_f64(rng.gen::<f64>()) * total;
            cumulative.partition_point(|&c| c <= u).min(n - 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_bootstrap_range_and_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let idx = bootstrap_indices(&mut rng, 50);
        assert_eq!(idx.len(), 50);
        assert!(idx.iter().all(|&i| i < 50));
    }

    #[test]
    fn test_bootstrap_is_deterministic() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(bootstrap_indices(&mut a, 20), bootstrap_indices(&mut b, 20));
    }

    #[test]
    fn test_sample_without_replacement_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut idx = sample_without_replacement(&mut rng, 30, 10);
        assert_eq!(idx.len(), 10);
        idx.sort_unstable();
        idx.dedup();
        assert_eq!(idx.len(), 10);
    }

    #[test]
    fn test_sample_without_replacement_caps_at_n() {
        let mut rng = StdRng::seed_from_u64(3);
        let idx = sample_without_replacement(&mut rng, 4, 100);
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn test_weighted_indices_follow_mass() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = [0.0_f64, 0.0, 1.0, 0.0];
        let idx = weighted_indices(&mut rng, &weights, 25);
        assert!(idx.iter().all(|&i| i == 2));
    }

    #[test]
    fn test_weighted_indices_in_bounds() {
        let mut rng = StdRng::seed_from_u64(19);
        let weights = [0.2_f64, 0.3, 0.5];
        let idx = weighted_indices(&mut rng, &weights, 100);
        assert!(idx.iter().all(|&i| i < 3));
    }

    #[test]
    fn test_resolve_seed_passthrough() {
        assert_eq!(resolve_seed(Some(99)), 99);
    }
}
