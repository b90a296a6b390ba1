//! Extremely randomized tree estimators.
//!
//! Same growth machinery as the decision trees, but each candidate feature is
//! scored at a single uniform-random threshold drawn from its value range
//! instead of an exact scan.

use crate::grower::grow;
use crate::split::{ClassificationCriterion, GrowTarget, RegressionCriterion, SplitStrategy};
use crate::tree::Tree;
use crate::TreeParams;

use canopy_ml_core::sampling::resolve_seed;
use canopy_ml_core::validation::{
    check_feature_count, check_labels, check_sample_matrix, check_targets, encode_labels,
};
use canopy_ml_core::{
    EstimatorError, EstimatorResult, Fit, Float, Persist, Predict, Score, Tensor,
};
use canopy_ml_metrics::{accuracy, r2_score};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct ExtraTreeClassifier<T: Float> {
    criterion: ClassificationCriterion,
    params: TreeParams,
    seed: u64,
    classes: Vec<i64>,
    tree: Option<Tree<T>>,
}

impl<T: Float> ExtraTreeClassifier<T> {
    pub fn new(criterion: ClassificationCriterion, params: TreeParams) -> Self {
        let seed = resolve_seed(params.seed);
        ExtraTreeClassifier {
            criterion,
            params,
            seed,
            classes: Vec::new(),
            tree: None,
        }
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
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

    pub fn predict_proba(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        Ok(tree.predict_matrix(x)?)
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

impl<T: Float> Fit<Tensor<T>, [i64]> for ExtraTreeClassifier<T> {
    fn fit(&mut self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<&mut Self> {
        let (n_samples, _) = check_sample_matrix(x)?;
        check_labels(y, n_samples)?;
        self.params.validate()?;

        let (classes, encoded) = encode_labels(y);
        let target = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: classes.len(),
            criterion: self.criterion,
        };
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree = grow(
            x,
            &target,
            (0..n_samples).collect(),
            &self.params.grow_config(SplitStrategy::ExtremelyRandomized),
            &mut rng,
        );
        self.classes = classes;
        self.tree = Some(tree);
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for ExtraTreeClassifier<T> {
    type Output = Vec<i64>;

    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Vec<i64>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        let n = x.shape().dims()[0];
        Ok((0..n)
            .map(|row| self.classes[tree.predict_index(x, row)])
            .collect())
    }
}

impl<T: Float> Score<Tensor<T>, [i64]> for ExtraTreeClassifier<T> {
    fn score(&self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        check_labels(y, pred.len())?;
        Ok(accuracy(y, &pred))
    }
}

impl<T: Float> Persist for ExtraTreeClassifier<T> {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct ExtraTreeRegressor<T: Float> {
    criterion: RegressionCriterion,
    params: TreeParams,
    seed: u64,
    y_ndim: usize,
    tree: Option<Tree<T>>,
}

impl<T: Float> ExtraTreeRegressor<T> {
    pub fn new(criterion: RegressionCriterion, params: TreeParams) -> Self {
        let seed = resolve_seed(params.seed);
        ExtraTreeRegressor {
            criterion,
            params,
            seed,
            y_ndim: 1,
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

    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Vec<usize>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        Ok(tree.apply(x))
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        Ok(self.fitted()?.feature_importances())
    }
}

impl<T: Float> Fit<Tensor<T>, Tensor<T>> for ExtraTreeRegressor<T> {
    fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<&mut Self> {
        let (n_samples, _) = check_sample_matrix(x)?;
        let n_outputs = check_targets(y, n_samples)?;
        self.params.validate()?;

        let target = GrowTarget::Values {
            y,
            n_outputs,
            criterion: self.criterion,
        };
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree = grow(
            x,
            &target,
            (0..n_samples).collect(),
            &self.params.grow_config(SplitStrategy::ExtremelyRandomized),
            &mut rng,
        );
        self.y_ndim = y.ndim();
        self.tree = Some(tree);
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for ExtraTreeRegressor<T> {
    type Output = Tensor<T>;

    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        let matrix = tree.predict_matrix(x)?;
        if self.y_ndim == 1 {
            let n = x.shape().dims()[0];
            Ok(matrix.reshape(vec![n])?)
        } else {
            Ok(matrix)
        }
    }
}

impl<T: Float> Score<Tensor<T>, Tensor<T>> for ExtraTreeRegressor<T> {
    fn score(&self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        Ok(r2_score(y, &pred))
    }
}

impl<T: Float> Persist for ExtraTreeRegressor<T> {}
