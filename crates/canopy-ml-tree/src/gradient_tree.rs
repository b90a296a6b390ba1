//! Regression tree fit on per-sample gradient/hessian pairs.
//!
//! This is the base learner of the boosting ensembles. Splits maximise the
//! Newton gain `G_l^2/(H_l+lambda) + G_r^2/(H_r+lambda) - G^2/(H+lambda)` and
//! leaves output the step `-G/(H+lambda)` scaled by the shrinkage rate.

use crate::grower::grow;
use crate::split::{GrowTarget, SplitStrategy};
use crate::tree::Tree;
use crate::TreeParams;

use canopy_ml_core::sampling::resolve_seed;
use canopy_ml_core::validation::{
    check_feature_count, check_sample_matrix, require_non_negative_f64, require_positive_f64,
};
use canopy_ml_core::{
    EstimatorError, EstimatorResult, Float, Persist, Predict, Tensor,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Hyperparameters of [`GradientTreeRegressor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientTreeParams {
    pub tree: TreeParams,
    /// L2 regularisation added to the hessian sum in every leaf and gain term.
    pub reg_lambda: f64,
    /// Multiplier applied to leaf outputs, the boosting learning rate.
    pub shrinkage_rate: f64,
}

impl Default for GradientTreeParams {
    fn default() -> Self {
        GradientTreeParams {
            tree: TreeParams::default(),
            reg_lambda: 0.0,
            shrinkage_rate: 1.0,
        }
    }
}

impl GradientTreeParams {
    fn validate(&self) -> EstimatorResult<()> {
        self.tree.validate()?;
        require_non_negative_f64("reg_lambda", self.reg_lambda)?;
        require_positive_f64("shrinkage_rate", self.shrinkage_rate)?;
        Ok(())
    }
}

/// Single tree of a boosting round.
///
/// Unlike the other tree estimators it does not see targets directly; the
/// caller supplies the loss gradients and hessians evaluated at the current
/// ensemble prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct GradientTreeRegressor<T: Float> {
    params: GradientTreeParams,
    seed: u64,
    tree: Option<Tree<T>>,
}

impl<T: Float> GradientTreeRegressor<T> {
    pub fn new(params: GradientTreeParams) -> Self {
        let seed = resolve_seed(params.tree.seed);
        GradientTreeRegressor {
            params,
            seed,
            tree: None,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn fitted(&self) -> EstimatorResult<&Tree<T>> {
        self.tree.as_ref().ok_or(EstimatorError::NotFitted)
    }

    pub fn tree(&self) -> EstimatorResult<&Tree<T>> {
        self.fitted()
    }

    /// Fits the tree to gradient/hessian pairs evaluated per sample.
    pub fn fit(&mut self, x: &Tensor<T>, grad: &[T], hess: &[T]) -> EstimatorResult<&mut Self> {
        let (n_samples, _) = check_sample_matrix(x)?;
        check_pairs(grad, hess, n_samples)?;
        self.params.validate()?;

        let target = GrowTarget::Gradients {
            grad,
            hess,
            reg_lambda: T::from_f64(self.params.reg_lambda),
            shrinkage_rate: T::from_f64(self.params.shrinkage_rate),
        };
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree = grow(
            x,
            &target,
            (0..n_samples).collect(),
            &self.params.tree.grow_config(SplitStrategy::Standard),
            &mut rng,
        );
        self.tree = Some(tree);
        Ok(self)
    }

    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Vec<usize>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        Ok(tree.apply(x))
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        Ok(self.fitted()?.feature_importances())
    }
}

impl<T: Float> Predict<Tensor<T>> for GradientTreeRegressor<T> {
    type Output = Tensor<T>;

    /// Shrunk Newton step of the leaf reached by each sample, shape `[n]`.
    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        let n = x.shape().dims()[0];
        Ok(tree.predict_matrix(x)?.reshape(vec![n])?)
    }
}

impl<T: Float> Persist for GradientTreeRegressor<T> {}

fn check_pairs<T: Float>(grad: &[T], hess: &[T], n_samples: usize) -> EstimatorResult<()> {
    if grad.len() != n_samples || hess.len() != n_samples {
        return Err(EstimatorError::Validation(format!(
            "gradient/hessian lengths {}/{} do not match sample count {}",
            grad.len(),
            hess.len(),
            n_samples
        )));
    }
    if grad.iter().chain(hess.iter()).any(|v| !v.is_finite()) {
        return Err(EstimatorError::Validation(
            "gradients and hessians must be finite".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line() -> Tensor<f64> {
        Tensor::from_vec2d(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]]).unwrap()
    }

    #[test]
    fn test_newton_step_leaves() {
        let x = line();
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0, 1.0, 1.0, 1.0];
        let mut model = GradientTreeRegressor::new(GradientTreeParams {
            tree: TreeParams {
                seed: Some(0),
                ..Default::default()
            },
            ..Default::default()
        });
        model.fit(&x, &grad, &hess).unwrap();

        let pred = model.predict(&x).unwrap();
        assert_eq!(pred.shape_vec(), vec![4]);
        assert_relative_eq!(pred.data()[0], -1.0);
        assert_relative_eq!(pred.data()[1], -1.0);
        assert_relative_eq!(pred.data()[2], 1.0);
        assert_relative_eq!(pred.data()[3], 1.0);
    }

    #[test]
    fn test_shrinkage_scales_leaf_output() {
        let x = line();
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0, 1.0, 1.0, 1.0];
        let mut model = GradientTreeRegressor::new(GradientTreeParams {
            tree: TreeParams {
                seed: Some(0),
                ..Default::default()
            },
            shrinkage_rate: 0.1,
            ..Default::default()
        });
        model.fit(&x, &grad, &hess).unwrap();
        let pred = model.predict(&x).unwrap();
        assert_relative_eq!(pred.data()[0], -0.1);
        assert_relative_eq!(pred.data()[3], 0.1);
    }

    #[test]
    fn test_reg_lambda_damps_steps() {
        let x = line();
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0, 1.0, 1.0, 1.0];
        let mut model = GradientTreeRegressor::new(GradientTreeParams {
            tree: TreeParams {
                seed: Some(0),
                ..Default::default()
            },
            reg_lambda: 2.0,
            ..Default::default()
        });
        model.fit(&x, &grad, &hess).unwrap();
        // Leaf step -G/(H+lambda) = -2/(2+2) on the left half.
        let pred = model.predict(&x).unwrap();
        assert_relative_eq!(pred.data()[0], -0.5);
        assert_relative_eq!(pred.data()[3], 0.5);
    }

    #[test]
    fn test_constant_gradients_yield_single_leaf() {
        let x = line();
        let grad = [1.0; 4];
        let hess = [1.0; 4];
        let mut model = GradientTreeRegressor::new(GradientTreeParams {
            tree: TreeParams {
                seed: Some(0),
                ..Default::default()
            },
            ..Default::default()
        });
        model.fit(&x, &grad, &hess).unwrap();

        // Every candidate split has zero Newton gain, so the root stays a leaf.
        assert_eq!(model.tree().unwrap().n_leaves(), 1);
        let pred = model.predict(&x).unwrap();
        for &p in pred.data() {
            assert_relative_eq!(p, -1.0);
        }
        assert!(model
            .feature_importances()
            .unwrap()
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let x = line();
        let mut model = GradientTreeRegressor::<f64>::new(GradientTreeParams::default());
        assert!(matches!(
            model.fit(&x, &[1.0, 2.0], &[1.0, 1.0, 1.0, 1.0]),
            Err(EstimatorError::Validation(_))
        ));
        assert!(matches!(
            model.fit(&x, &[1.0, f64::NAN, 1.0, 1.0], &[1.0; 4]),
            Err(EstimatorError::Validation(_))
        ));

        let mut bad = GradientTreeRegressor::<f64>::new(GradientTreeParams {
            reg_lambda: -1.0,
            ..Default::default()
        });
        assert!(matches!(
            bad.fit(&x, &[1.0; 4], &[1.0; 4]),
            Err(EstimatorError::Validation(_))
        ));

        let mut zero_rate = GradientTreeRegressor::<f64>::new(GradientTreeParams {
            shrinkage_rate: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            zero_rate.fit(&x, &[1.0; 4], &[1.0; 4]),
            Err(EstimatorError::Validation(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let x = line();
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];
        let mut model = GradientTreeRegressor::new(GradientTreeParams {
            tree: TreeParams {
                seed: Some(17),
                ..Default::default()
            },
            ..Default::default()
        });
        model.fit(&x, &grad, &hess).unwrap();

        let snapshot = model.to_snapshot().unwrap();
        let restored = GradientTreeRegressor::<f64>::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
