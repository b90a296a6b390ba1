//! Split criteria and the per-feature threshold search.
//!
//! [`GrowTarget`] bundles the target-side statistics for one growing call so
//! the grower itself stays agnostic of what a tree predicts: class histograms,
//! per-output means, or first/second-order gradient sums all answer the same
//! four questions (impurity, leaf value, purity, best threshold).

use canopy_ml_core::{Float, Tensor};
use serde::{Deserialize, Serialize};

/// Node-impurity measure for classification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassificationCriterion {
    #[default]
    Gini,
    /// Shannon entropy in nats.
    Entropy,
}

/// Node-impurity measure for regression targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegressionCriterion {
    /// Population variance of the targets in the node.
    #[default]
    Mse,
    /// Mean absolute deviation from the node mean.
    Mae,
}

/// How candidate thresholds are generated during split search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Evaluate every midpoint between distinct consecutive sorted values.
    Standard,
    /// Evaluate one uniformly-random threshold within the feature's range.
    ExtremelyRandomized,
}

/// Best split found for one node.
#[derive(Debug, Clone, Copy)]
pub struct SplitCandidate<T: Float> {
    pub feature_index: usize,
    pub threshold: T,
    pub gain: T,
}

/// Target-side statistics for one growing call.
pub enum GrowTarget<'a, T: Float> {
    /// Labels in dense `0..n_classes` encoding.
    Classes {
        encoded: &'a [usize],
        n_classes: usize,
        criterion: ClassificationCriterion,
    },
    /// Raw regression targets, `[n]` or `[n, n_outputs]`.
    Values {
        y: &'a Tensor<T>,
        n_outputs: usize,
        criterion: RegressionCriterion,
    },
    /// Per-sample gradient/hessian pairs for Newton-style growth.
    Gradients {
        grad: &'a [T],
        hess: &'a [T],
        reg_lambda: T,
        shrinkage_rate: T,
    },
}

impl<'a, T: Float> GrowTarget<'a, T> {
    /// Length of the leaf output vectors this target produces.
    pub fn n_outputs(&self) -> usize {
        match self {
            GrowTarget::Classes { n_classes, .. } => *n_classes,
            GrowTarget::Values { n_outputs, .. } => *n_outputs,
            GrowTarget::Gradients { .. } => 1,
        }
    }

    /// Impurity of the node holding `indices`.
    ///
    /// For gradient targets this is the Newton structure score
    /// `-(sum g)^2 / (sum h + lambda)`, which is negative by construction and
    /// only comparable across splits of the same node.
    pub fn node_impurity(&self, indices: &[usize]) -> T {
        match self {
            GrowTarget::Classes {
                encoded,
                n_classes,
                criterion,
            } => {
                let mut counts = vec![0usize; *n_classes];
                for &i in indices {
                    counts[encoded[i]] += 1;
                }
                class_impurity(&counts, indices.len(), *criterion)
            }
            GrowTarget::Values {
                y,
                n_outputs,
                criterion,
            } => value_impurity(y.data(), *n_outputs, indices, *criterion),
            GrowTarget::Gradients {
                grad,
                hess,
                reg_lambda,
                ..
            } => {
                let (g, h) = sum_gh(grad, hess, indices);
                -(g * g) / (h + *reg_lambda)
            }
        }
    }

    /// Aggregated leaf output for `indices`: normalized class frequencies,
    /// per-output means, or the shrunk Newton step `-G/(H+lambda)*shrinkage`.
    pub fn leaf_value(&self, indices: &[usize]) -> Vec<T> {
        let nf = T::from_usize(indices.len());
        match self {
            GrowTarget::Classes {
                encoded, n_classes, ..
            } => {
                let mut freq = vec![T::ZERO; *n_classes];
                for &i in indices {
                    freq[encoded[i]] += T::ONE;
                }
                for f in freq.iter_mut() {
                    *f /= nf;
                }
                freq
            }
            GrowTarget::Values { y, n_outputs, .. } => {
                let data = y.data();
                let mut means = vec![T::ZERO; *n_outputs];
                for &i in indices {
                    for (o, m) in means.iter_mut().enumerate() {
                        *m += data[i * n_outputs + o];
                    }
                }
                for m in means.iter_mut() {
                    *m /= nf;
                }
                means
            }
            GrowTarget::Gradients {
                grad,
                hess,
                reg_lambda,
                shrinkage_rate,
            } => {
                let (g, h) = sum_gh(grad, hess, indices);
                vec![-g / (h + *reg_lambda) * *shrinkage_rate]
            }
        }
    }

    /// Whether a node with the given impurity should stop growing as pure.
    /// Gradient scores are negative, so purity never stops gradient trees.
    pub fn purity_stop(&self, impurity: T) -> bool {
        match self {
            GrowTarget::Gradients { .. } => false,
            _ => impurity <= T::ZERO,
        }
    }

    /// Exact search over all boundary midpoints of a sorted feature column.
    ///
    /// `column` pairs each sample's feature value with its row index, sorted
    /// ascending by value. Returns the best `(threshold, gain)` with a
    /// strictly positive gain, or `None`. Ties keep the first boundary.
    pub fn best_threshold(
        &self,
        column: &[(T, usize)],
        parent_impurity: T,
        min_samples_leaf: usize,
    ) -> Option<(T, T)> {
        match self {
            GrowTarget::Classes {
                encoded,
                n_classes,
                criterion,
            } => scan_classes(column, encoded, *n_classes, *criterion, parent_impurity, min_samples_leaf),
            GrowTarget::Values {
                y,
                n_outputs,
                criterion,
            } => match criterion {
                RegressionCriterion::Mse => {
                    scan_mse(column, y.data(), *n_outputs, parent_impurity, min_samples_leaf)
                }
                RegressionCriterion::Mae => {
                    scan_mae(column, y.data(), *n_outputs, parent_impurity, min_samples_leaf)
                }
            },
            GrowTarget::Gradients {
                grad,
                hess,
                reg_lambda,
                ..
            } => scan_gradients(column, grad, hess, *reg_lambda, min_samples_leaf),
        }
    }

    /// Gain of partitioning `column` at one fixed threshold (`value < t` goes
    /// left), or `None` if a side underflows `min_samples_leaf` or the gain
    /// is not positive.
    pub fn threshold_gain(
        &self,
        column: &[(T, usize)],
        threshold: T,
        parent_impurity: T,
        min_samples_leaf: usize,
    ) -> Option<T> {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &(v, i) in column {
            if v < threshold {
                left.push(i);
            } else {
                right.push(i);
            }
        }
        if left.len() < min_samples_leaf || right.len() < min_samples_leaf {
            return None;
        }
        let gain = match self {
            GrowTarget::Gradients {
                grad,
                hess,
                reg_lambda,
                ..
            } => {
                let (lg, lh) = sum_gh(grad, hess, &left);
                let (rg, rh) = sum_gh(grad, hess, &right);
                let (tg, th) = (lg + rg, lh + rh);
                lg * lg / (lh + *reg_lambda) + rg * rg / (rh + *reg_lambda)
                    - tg * tg / (th + *reg_lambda)
            }
            _ => {
                let nf = T::from_usize(column.len());
                let wl = T::from_usize(left.len()) / nf;
                let wr = T::from_usize(right.len()) / nf;
                parent_impurity
                    - wl * self.node_impurity(&left)
                    - wr * self.node_impurity(&right)
            }
        };
        if gain > T::ZERO {
            Some(gain)
        } else {
            None
        }
    }
}

fn sum_gh<T: Float>(grad: &[T], hess: &[T], indices: &[usize]) -> (T, T) {
    let mut g = T::ZERO;
    let mut h = T::ZERO;
    for &i in indices {
        g += grad[i];
        h += hess[i];
    }
    (g, h)
}

fn class_impurity<T: Float>(counts: &[usize], n: usize, criterion: ClassificationCriterion) -> T {
    let nf = T::from_usize(n);
    match criterion {
        ClassificationCriterion::Gini => {
            let mut gini = T::ONE;
            for &c in counts {
                let p = T::from_usize(c) / nf;
                gini -= p * p;
            }
            gini
        }
        ClassificationCriterion::Entropy => {
            let mut entropy = T::ZERO;
            for &c in counts {
                if c > 0 {
                    let p = T::from_usize(c) / nf;
                    entropy -= p * p.ln();
                }
            }
            entropy
        }
    }
}

fn value_impurity<T: Float>(
    data: &[T],
    n_outputs: usize,
    indices: &[usize],
    criterion: RegressionCriterion,
) -> T {
    let nf = T::from_usize(indices.len());
    let mut total = T::ZERO;
    for o in 0..n_outputs {
        let mut sum = T::ZERO;
        for &i in indices {
            sum += data[i * n_outputs + o];
        }
        let mean = sum / nf;
        match criterion {
            RegressionCriterion::Mse => {
                let mut sq = T::ZERO;
                for &i in indices {
                    let d = data[i * n_outputs + o] - mean;
                    sq += d * d;
                }
                total += sq / nf;
            }
            RegressionCriterion::Mae => {
                let mut abs = T::ZERO;
                for &i in indices {
                    abs += (data[i * n_outputs + o] - mean).abs();
                }
                total += abs / nf;
            }
        }
    }
    total / T::from_usize(n_outputs)
}

fn scan_classes<T: Float>(
    column: &[(T, usize)],
    encoded: &[usize],
    n_classes: usize,
    criterion: ClassificationCriterion,
    parent_impurity: T,
    min_samples_leaf: usize,
) -> Option<(T, T)> {
    let n = column.len();
    if n < 2 {
        return None;
    }
    let nf = T::from_usize(n);
    let mut left_counts = vec![0usize; n_classes];
    let mut right_counts = vec![0usize; n_classes];
    for &(_, i) in column {
        right_counts[encoded[i]] += 1;
    }

    let mut best = None;
    let mut best_gain = T::ZERO;
    for i in 0..n - 1 {
        let (v, idx) = column[i];
        let cls = encoded[idx];
        left_counts[cls] += 1;
        right_counts[cls] -= 1;
        if column[i + 1].0 <= v {
            continue;
        }
        let n_left = i + 1;
        let n_right = n - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let left_imp = class_impurity(&left_counts, n_left, criterion);
        let right_imp = class_impurity(&right_counts, n_right, criterion);
        let gain = parent_impurity
            - (T::from_usize(n_left) / nf) * left_imp
            - (T::from_usize(n_right) / nf) * right_imp;
        if gain > best_gain {
            best_gain = gain;
            best = Some(((v + column[i + 1].0) / T::TWO, gain));
        }
    }
    best
}

fn scan_mse<T: Float>(
    column: &[(T, usize)],
    data: &[T],
    n_outputs: usize,
    parent_impurity: T,
    min_samples_leaf: usize,
) -> Option<(T, T)> {
    let n = column.len();
    if n < 2 {
        return None;
    }
    let nf = T::from_usize(n);
    let mut left_sum = vec![T::ZERO; n_outputs];
    let mut left_sq = vec![T::ZERO; n_outputs];
    let mut right_sum = vec![T::ZERO; n_outputs];
    let mut right_sq = vec![T::ZERO; n_outputs];
    for &(_, i) in column {
        for o in 0..n_outputs {
            let v = data[i * n_outputs + o];
            right_sum[o] += v;
            right_sq[o] += v * v;
        }
    }

    let mut best = None;
    let mut best_gain = T::ZERO;
    for i in 0..n - 1 {
        let (v, idx) = column[i];
        for o in 0..n_outputs {
            let t = data[idx * n_outputs + o];
            left_sum[o] += t;
            left_sq[o] += t * t;
            right_sum[o] -= t;
            right_sq[o] -= t * t;
        }
        if column[i + 1].0 <= v {
            continue;
        }
        let n_left = i + 1;
        let n_right = n - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let left_imp = variance_from_sums(&left_sum, &left_sq, n_left);
        let right_imp = variance_from_sums(&right_sum, &right_sq, n_right);
        let gain = parent_impurity
            - (T::from_usize(n_left) / nf) * left_imp
            - (T::from_usize(n_right) / nf) * right_imp;
        if gain > best_gain {
            best_gain = gain;
            best = Some(((v + column[i + 1].0) / T::TWO, gain));
        }
    }
    best
}

fn variance_from_sums<T: Float>(sum: &[T], sq: &[T], n: usize) -> T {
    let nf = T::from_usize(n);
    let mut total = T::ZERO;
    for o in 0..sum.len() {
        let mean = sum[o] / nf;
        // clamp roundoff so a constant side reads as exactly pure
        total += (sq[o] / nf - mean * mean).max(T::ZERO);
    }
    total / T::from_usize(sum.len())
}

fn scan_mae<T: Float>(
    column: &[(T, usize)],
    data: &[T],
    n_outputs: usize,
    parent_impurity: T,
    min_samples_leaf: usize,
) -> Option<(T, T)> {
    let n = column.len();
    if n < 2 {
        return None;
    }
    let nf = T::from_usize(n);
    let mut left_sum = vec![T::ZERO; n_outputs];
    let mut right_sum = vec![T::ZERO; n_outputs];
    for &(_, i) in column {
        for o in 0..n_outputs {
            right_sum[o] += data[i * n_outputs + o];
        }
    }

    let mut best = None;
    let mut best_gain = T::ZERO;
    for i in 0..n - 1 {
        let (v, idx) = column[i];
        for o in 0..n_outputs {
            let t = data[idx * n_outputs + o];
            left_sum[o] += t;
            right_sum[o] -= t;
        }
        if column[i + 1].0 <= v {
            continue;
        }
        let n_left = i + 1;
        let n_right = n - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let left_imp = deviation_from_means(&column[..=i], data, n_outputs, &left_sum);
        let right_imp = deviation_from_means(&column[i + 1..], data, n_outputs, &right_sum);
        let gain = parent_impurity
            - (T::from_usize(n_left) / nf) * left_imp
            - (T::from_usize(n_right) / nf) * right_imp;
        if gain > best_gain {
            best_gain = gain;
            best = Some(((v + column[i + 1].0) / T::TWO, gain));
        }
    }
    best
}

fn deviation_from_means<T: Float>(
    part: &[(T, usize)],
    data: &[T],
    n_outputs: usize,
    sums: &[T],
) -> T {
    let nf = T::from_usize(part.len());
    let mut total = T::ZERO;
    for o in 0..n_outputs {
        let mean = sums[o] / nf;
        let mut abs = T::ZERO;
        for &(_, i) in part {
            abs += (data[i * n_outputs + o] - mean).abs();
        }
        total += abs / nf;
    }
    total / T::from_usize(n_outputs)
}

fn scan_gradients<T: Float>(
    column: &[(T, usize)],
    grad: &[T],
    hess: &[T],
    reg_lambda: T,
    min_samples_leaf: usize,
) -> Option<(T, T)> {
    let n = column.len();
    if n < 2 {
        return None;
    }
    let mut total_g = T::ZERO;
    let mut total_h = T::ZERO;
    for &(_, i) in column {
        total_g += grad[i];
        total_h += hess[i];
    }
    let parent_term = total_g * total_g / (total_h + reg_lambda);

    let mut left_g = T::ZERO;
    let mut left_h = T::ZERO;
    let mut best = None;
    let mut best_gain = T::ZERO;
    for i in 0..n - 1 {
        let (v, idx) = column[i];
        left_g += grad[idx];
        left_h += hess[idx];
        if column[i + 1].0 <= v {
            continue;
        }
        let n_left = i + 1;
        let n_right = n - n_left;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let right_g = total_g - left_g;
        let right_h = total_h - left_h;
        let gain = left_g * left_g / (left_h + reg_lambda)
            + right_g * right_g / (right_h + reg_lambda)
            - parent_term;
        if gain > best_gain {
            best_gain = gain;
            best = Some(((v + column[i + 1].0) / T::TWO, gain));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn column_of(values: &[f64]) -> Vec<(f64, usize)> {
        let mut col: Vec<(f64, usize)> = values.iter().copied().zip(0..).collect();
        col.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        col
    }

    #[test]
    fn test_gini_and_entropy_impurity() {
        let encoded = vec![0usize, 0, 1, 1];
        let gini: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Gini,
        };
        assert_relative_eq!(gini.node_impurity(&[0, 1, 2, 3]), 0.5);
        assert_relative_eq!(gini.node_impurity(&[0, 1]), 0.0);

        let entropy: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Entropy,
        };
        assert_relative_eq!(entropy.node_impurity(&[0, 1, 2, 3]), (2.0f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_variance_and_deviation_impurity() {
        let y = Tensor::from_slice(&[0.0, 0.0, 10.0, 10.0]);
        let mse = GrowTarget::Values {
            y: &y,
            n_outputs: 1,
            criterion: RegressionCriterion::Mse,
        };
        assert_relative_eq!(mse.node_impurity(&[0, 1, 2, 3]), 25.0);

        let mae = GrowTarget::Values {
            y: &y,
            n_outputs: 1,
            criterion: RegressionCriterion::Mae,
        };
        assert_relative_eq!(mae.node_impurity(&[0, 1, 2, 3]), 5.0);
    }

    #[test]
    fn test_best_threshold_mse() {
        let y = Tensor::from_slice(&[0.0, 0.0, 10.0, 10.0]);
        let target = GrowTarget::Values {
            y: &y,
            n_outputs: 1,
            criterion: RegressionCriterion::Mse,
        };
        let col = column_of(&[0.0, 1.0, 2.0, 3.0]);
        let parent = target.node_impurity(&[0, 1, 2, 3]);
        let (threshold, gain) = target.best_threshold(&col, parent, 1).unwrap();
        assert_relative_eq!(threshold, 1.5);
        assert_relative_eq!(gain, 25.0);
    }

    #[test]
    fn test_best_threshold_classes() {
        let encoded = vec![0usize, 0, 1, 1];
        let target: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Gini,
        };
        let col = column_of(&[0.0, 1.0, 2.0, 3.0]);
        let (threshold, gain) = target.best_threshold(&col, 0.5, 1).unwrap();
        assert_relative_eq!(threshold, 1.5);
        assert_relative_eq!(gain, 0.5);
    }

    #[test]
    fn test_best_threshold_gradients() {
        let grad = vec![1.0, 1.0, -1.0, -1.0];
        let hess = vec![1.0, 1.0, 1.0, 1.0];
        let target = GrowTarget::Gradients {
            grad: &grad,
            hess: &hess,
            reg_lambda: 0.0,
            shrinkage_rate: 1.0,
        };
        let col = column_of(&[0.0, 1.0, 2.0, 3.0]);
        let parent = target.node_impurity(&[0, 1, 2, 3]);
        let (threshold, gain) = target.best_threshold(&col, parent, 1).unwrap();
        assert_relative_eq!(threshold, 1.5);
        assert_relative_eq!(gain, 4.0);
    }

    #[test]
    fn test_min_samples_leaf_restricts_boundaries() {
        // With min_samples_leaf=2 only the middle boundary is legal even
        // though the outer boundary separates better.
        let encoded = vec![1usize, 0, 0, 0];
        let target: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Gini,
        };
        let col = column_of(&[0.0, 1.0, 2.0, 3.0]);
        let parent = target.node_impurity(&[0, 1, 2, 3]);
        let unrestricted = target.best_threshold(&col, parent, 1).unwrap();
        assert_relative_eq!(unrestricted.0, 0.5);
        let restricted = target.best_threshold(&col, parent, 2).unwrap();
        assert_relative_eq!(restricted.0, 1.5);
    }

    #[test]
    fn test_constant_column_has_no_split() {
        let encoded = vec![0usize, 1, 0, 1];
        let target: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Gini,
        };
        let col = column_of(&[5.0, 5.0, 5.0, 5.0]);
        assert!(target.best_threshold(&col, 0.5, 1).is_none());
    }

    #[test]
    fn test_threshold_gain_partition() {
        let encoded = vec![0usize, 0, 1, 1];
        let target: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Gini,
        };
        let col = column_of(&[0.0, 1.0, 2.0, 3.0]);
        let gain = target.threshold_gain(&col, 1.5, 0.5, 1).unwrap();
        assert_relative_eq!(gain, 0.5);
        // A useless threshold separates nothing of value
        assert!(target.threshold_gain(&col, 0.5, 0.5, 2).is_none());
    }

    #[test]
    fn test_leaf_values() {
        let encoded = vec![0usize, 0, 1];
        let classes: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 2,
            criterion: ClassificationCriterion::Gini,
        };
        let freq = classes.leaf_value(&[0, 1, 2]);
        assert_relative_eq!(freq[0], 2.0 / 3.0);
        assert_relative_eq!(freq[1], 1.0 / 3.0);

        let grad = vec![1.0, 1.0, -1.0, -1.0];
        let hess = vec![1.0, 1.0, 1.0, 1.0];
        let gradients = GrowTarget::Gradients {
            grad: &grad,
            hess: &hess,
            reg_lambda: 0.0,
            shrinkage_rate: 0.5,
        };
        let step = gradients.leaf_value(&[0, 1]);
        assert_relative_eq!(step[0], -0.5);
    }

    #[test]
    fn test_purity_stop() {
        let encoded = vec![0usize, 0];
        let classes: GrowTarget<'_, f64> = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: 1,
            criterion: ClassificationCriterion::Gini,
        };
        assert!(classes.purity_stop(0.0));
        assert!(!classes.purity_stop(0.3));

        let grad = vec![1.0];
        let hess = vec![1.0];
        let gradients = GrowTarget::Gradients {
            grad: &grad,
            hess: &hess,
            reg_lambda: 0.0,
            shrinkage_rate: 1.0,
        };
        assert!(!gradients.purity_stop(-1.0));
    }

    #[test]
    fn test_multi_output_means() {
        let y = Tensor::from_vec2d(&[vec![1.0, 10.0], vec![3.0, 30.0]]).unwrap();
        let target = GrowTarget::Values {
            y: &y,
            n_outputs: 2,
            criterion: RegressionCriterion::Mse,
        };
        let means = target.leaf_value(&[0, 1]);
        assert_relative_eq!(means[0], 2.0);
        assert_relative_eq!(means[1], 20.0);
    }
}
