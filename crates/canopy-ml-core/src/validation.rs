//! Input validation shared by every estimator.
//!
//! Estimators call these free functions at the top of `fit`/`predict` and
//! propagate [`EstimatorError::Validation`] instead of panicking on bad input.

use crate::dtype::Float;
use crate::error::{EstimatorError, EstimatorResult};
use crate::tensor::Tensor;

/// Validate a 2-D sample matrix and return `(n_samples, n_features)`.
///
/// Rejects empty matrices and non-finite values (NaN or infinity).
pub fn check_sample_matrix<T: Float>(x: &Tensor<T>) -> EstimatorResult<(usize, usize)> {
    let dims = x.shape_vec();
    if dims.len() != 2 {
        return Err(EstimatorError::Validation(format!(
            "expected a 2-D sample matrix, got {} dimension(s)",
            dims.len()
        )));
    }
    let (n_samples, n_features) = (dims[0], dims[1]);
    if n_samples == 0 {
        return Err(EstimatorError::Validation(
            "sample matrix has no rows".to_string(),
        ));
    }
    if n_features == 0 {
        return Err(EstimatorError::Validation(
            "sample matrix has no feature columns".to_string(),
        ));
    }
    if x.data().iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::Validation(
            "sample matrix contains non-finite values".to_string(),
        ));
    }
    Ok((n_samples, n_features))
}

/// Validate a classification label vector against the sample count.
pub fn check_labels(y: &[i64], n_samples: usize) -> EstimatorResult<()> {
    if y.len() != n_samples {
        return Err(EstimatorError::Validation(format!(
            "label count {} does not match sample count {}",
            y.len(),
            n_samples
        )));
    }
    Ok(())
}

/// Validate a regression target tensor (1-D `[n]` or 2-D `[n, k]`) and
/// return the number of outputs.
pub fn check_targets<T: Float>(y: &Tensor<T>, n_samples: usize) -> EstimatorResult<usize> {
    let dims = y.shape_vec();
    let (rows, n_outputs) = match dims.len() {
        1 => (dims[0], 1),
        2 => (dims[0], dims[1]),
        d => {
            return Err(EstimatorError::Validation(format!(
                "expected a 1-D or 2-D target tensor, got {} dimension(s)",
                d
            )))
        }
    };
    if rows != n_samples {
        return Err(EstimatorError::Validation(format!(
            "target count {} does not match sample count {}",
            rows, n_samples
        )));
    }
    if n_outputs == 0 {
        return Err(EstimatorError::Validation(
            "target tensor has no output columns".to_string(),
        ));
    }
    if y.data().iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::Validation(
            "target tensor contains non-finite values".to_string(),
        ));
    }
    Ok(n_outputs)
}

/// Check that a prediction-time matrix carries the feature count seen at fit.
pub fn check_feature_count<T: Float>(x: &Tensor<T>, n_features: usize) -> EstimatorResult<()> {
    let (_, got) = check_sample_matrix(x)?;
    if got != n_features {
        return Err(EstimatorError::Validation(format!(
            "expected {} features, got {}",
            n_features, got
        )));
    }
    Ok(())
}

/// Map raw class labels to a dense `0..n_classes` encoding.
///
/// Returns the sorted distinct labels and, for each sample, the index of its
/// label in that sorted order.
pub fn encode_labels(y: &[i64]) -> (Vec<i64>, Vec<usize>) {
    let mut classes: Vec<i64> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let encoded = y
        .iter()
        .map(|label| classes.binary_search(label).unwrap_or(0))
        .collect();
    (classes, encoded)
}

// ─── Hyperparameter guards ──────────────────────────────────────────────────

/// Reject a zero integer hyperparameter.
pub fn require_positive(name: &str, value: usize) -> EstimatorResult<()> {
    if value == 0 {
        return Err(EstimatorError::Validation(format!(
            "{} must be at least 1, got 0",
            name
        )));
    }
    Ok(())
}

/// Reject a non-positive float hyperparameter.
pub fn require_positive_f64(name: &str, value: f64) -> EstimatorResult<()> {
    if !(value > 0.0) {
        return Err(EstimatorError::Validation(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Reject a negative float hyperparameter (zero is allowed).
pub fn require_non_negative_f64(name: &str, value: f64) -> EstimatorResult<()> {
    if !(value >= 0.0) {
        return Err(EstimatorError::Validation(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Reject a fraction outside `(0, 1]`.
pub fn require_fraction(name: &str, value: f64) -> EstimatorResult<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(EstimatorError::Validation(format!(
            "{} must lie in (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
