//! Estimator traits.
//!
//! Capabilities are split into small traits implemented per estimator rather
//! than funneled through a base type; shared behavior lives in free functions
//! (see [`crate::validation`]) and composable engines.

use crate::error::EstimatorResult;

/// Learn model state from a sample matrix and targets.
///
/// Returns `&mut Self` so calls can be chained into a fit-then-predict flow.
/// A failed fit returns before any model state is touched, so whatever was
/// fitted before (possibly nothing) stays in effect.
pub trait Fit<X: ?Sized, Y: ?Sized> {
    fn fit(&mut self, x: &X, y: &Y) -> EstimatorResult<&mut Self>;
}

/// Produce predictions for a sample matrix.
///
/// `Output` is `Vec<i64>` (class labels) for classifiers and a tensor of
/// values for regressors. Fails with `NotFitted` before a successful `fit`.
pub trait Predict<X: ?Sized> {
    type Output;

    fn predict(&self, x: &X) -> EstimatorResult<Self::Output>;
}

/// Default quality metric on a held-out set: accuracy for classifiers,
/// the R^2 coefficient of determination for regressors.
pub trait Score<X: ?Sized, Y: ?Sized> {
    fn score(&self, x: &X, y: &Y) -> EstimatorResult<f64>;
}
