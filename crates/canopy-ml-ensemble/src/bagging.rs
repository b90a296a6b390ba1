//! Generic engine behind the forest estimators.
//!
//! A forest is the same procedure four times over: derive one seed per
//! member, optionally resample rows, grow a tree, aggregate. The four
//! estimators differ only in the split strategy and resampling axis, so both
//! are plain enums here rather than a type hierarchy.

use canopy_ml_core::sampling::bootstrap_indices;
use canopy_ml_core::validation::require_positive;
use canopy_ml_core::{EstimatorResult, Float, Tensor, TensorResult};
use canopy_ml_tree::{grow, GrowConfig, GrowTarget, SplitStrategy, Tree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::parallel::run_with_threads;

/// Row sampling performed per ensemble member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resampling {
    /// Draw `n_samples` rows with replacement per member.
    Bootstrap,
    /// Every member trains on the full dataset.
    None,
}

/// Hyperparameters shared by the four forest estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Features per split search; `None` means `floor(sqrt(n_features))`
    /// clamped to `[1, n_features]`.
    pub max_features: Option<usize>,
    pub max_leaf_nodes: Option<usize>,
    /// 0 = all cores, 1 = sequential, n = exactly n threads.
    pub n_threads: usize,
    /// `None` draws a seed from process entropy at construction.
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            max_leaf_nodes: None,
            n_threads: 1,
            seed: None,
        }
    }
}

impl ForestParams {
    pub(crate) fn validate(&self) -> EstimatorResult<()> {
        require_positive("n_estimators", self.n_estimators)?;
        if let Some(d) = self.max_depth {
            require_positive("max_depth", d)?;
        }
        require_positive("min_samples_leaf", self.min_samples_leaf)?;
        if let Some(f) = self.max_features {
            require_positive("max_features", f)?;
        }
        if let Some(l) = self.max_leaf_nodes {
            require_positive("max_leaf_nodes", l)?;
        }
        Ok(())
    }

    pub(crate) fn grow_config(&self, n_features: usize, strategy: SplitStrategy) -> GrowConfig {
        let max_features = self
            .max_features
            .unwrap_or_else(|| default_max_features(n_features))
            .min(n_features);
        GrowConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            max_features: Some(max_features),
            max_leaf_nodes: self.max_leaf_nodes,
            strategy,
        }
    }
}

/// `floor(sqrt(n_features))`, at least 1.
pub(crate) fn default_max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt() as usize).max(1)
}

/// Grows the ensemble members.
///
/// Member seeds are drawn from the ensemble RNG up front, so the fitted
/// forest does not depend on thread scheduling.
pub(crate) fn fit_members<T: Float>(
    x: &Tensor<T>,
    target: &GrowTarget<'_, T>,
    config: &GrowConfig,
    resampling: Resampling,
    n_estimators: usize,
    n_threads: usize,
    seed: u64,
) -> Vec<Tree<T>> {
    let n_samples = x.shape().dims()[0];
    let mut rng = StdRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..n_estimators).map(|_| rng.gen()).collect();

    run_with_threads(n_threads, |parallelism| {
        parallelism.maybe_par_map(seeds, |member_seed| {
            let mut member_rng = StdRng::seed_from_u64(member_seed);
            let indices = match resampling {
                Resampling::Bootstrap => bootstrap_indices(&mut member_rng, n_samples),
                Resampling::None => (0..n_samples).collect(),
            };
            grow(x, target, indices, config, &mut member_rng)
        })
    })
}

/// Mean of per-member output matrices, `[n, width]`.
pub(crate) fn mean_matrix<T: Float>(
    trees: &[Tree<T>],
    x: &Tensor<T>,
    width: usize,
) -> TensorResult<Tensor<T>> {
    let n = x.shape().dims()[0];
    let mut acc = Tensor::zeros(vec![n, width]);
    for tree in trees {
        acc = acc.add(&tree.predict_matrix(x)?)?;
    }
    Ok(acc.div_scalar(T::from_usize(trees.len())))
}

/// Per-sample plurality vote over member argmax predictions. Vote-count ties
/// keep the lowest class index.
pub(crate) fn plurality_vote<T: Float>(
    trees: &[Tree<T>],
    x: &Tensor<T>,
    n_classes: usize,
) -> Vec<usize> {
    let n = x.shape().dims()[0];
    let mut votes = vec![0usize; n * n_classes];
    for tree in trees {
        for row in 0..n {
            votes[row * n_classes + tree.predict_index(x, row)] += 1;
        }
    }
    (0..n)
        .map(|row| {
            let row_votes = &votes[row * n_classes..(row + 1) * n_classes];
            let mut best = 0;
            for (class, &count) in row_votes.iter().enumerate() {
                if count > row_votes[best] {
                    best = class;
                }
            }
            best
        })
        .collect()
}

/// Stacks per-member leaf ids into an `[n, n_estimators]` matrix.
pub(crate) fn apply_members<T: Float>(trees: &[Tree<T>], x: &Tensor<T>) -> TensorResult<Tensor<T>> {
    let n = x.shape().dims()[0];
    let mut data = Vec::with_capacity(n * trees.len());
    for row in 0..n {
        for tree in trees {
            data.push(T::from_usize(tree.apply_row(x, row)));
        }
    }
    Tensor::new(data, vec![n, trees.len()])
}

/// Sum of per-member importances, renormalized to sum 1 when nonzero.
pub(crate) fn combined_importances<T: Float>(trees: &[Tree<T>], n_features: usize) -> Vec<T> {
    let mut total = vec![T::ZERO; n_features];
    for tree in trees {
        for (slot, &value) in total.iter_mut().zip(tree.feature_importances().iter()) {
            *slot += value;
        }
    }
    let sum: T = total.iter().copied().sum();
    if sum > T::ZERO {
        for value in &mut total {
            *value /= sum;
        }
    }
    total
}
