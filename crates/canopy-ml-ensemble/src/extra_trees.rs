//! Extra-trees (extremely randomized) forest classifier and regressor.
//!
//! Differs from the random forest on both engine axes: members train on the
//! full dataset (no bootstrap) and split search draws one random threshold
//! per candidate feature.

use crate::bagging::{
    apply_members, combined_importances, fit_members, mean_matrix, plurality_vote, ForestParams,
    Resampling,
};
use canopy_ml_core::sampling::resolve_seed;
use canopy_ml_core::validation::{
    check_feature_count, check_labels, check_sample_matrix, check_targets, encode_labels,
};
use canopy_ml_core::{
    EstimatorError, EstimatorResult, Fit, Float, Persist, Predict, Score, Tensor,
};
use canopy_ml_metrics::{accuracy, r2_score};
use canopy_ml_tree::{ClassificationCriterion, GrowTarget, RegressionCriterion, SplitStrategy, Tree};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct ExtraTreesClassifier<T: Float> {
    criterion: ClassificationCriterion,
    params: ForestParams,
    seed: u64,
    classes: Vec<i64>,
    n_features: usize,
    feature_importances: Vec<T>,
    estimators: Vec<Tree<T>>,
}

impl<T: Float> ExtraTreesClassifier<T> {
    pub fn new(criterion: ClassificationCriterion, params: ForestParams) -> Self {
        let seed = resolve_seed(params.seed);
        ExtraTreesClassifier {
            criterion,
            params,
            seed,
            classes: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
            estimators: Vec::new(),
        }
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn estimators(&self) -> &[Tree<T>] {
        &self.estimators
    }

    fn fitted(&self) -> EstimatorResult<&[Tree<T>]> {
        if self.estimators.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        Ok(&self.estimators)
    }

    pub fn predict_proba(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let trees = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        Ok(mean_matrix(trees, x, self.classes.len())?)
    }

    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let trees = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        Ok(apply_members(trees, x)?)
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        self.fitted()?;
        Ok(&self.feature_importances)
    }
}

impl<T: Float> Fit<Tensor<T>, [i64]> for ExtraTreesClassifier<T> {
    fn fit(&mut self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<&mut Self> {
        let (n_samples, n_features) = check_sample_matrix(x)?;
        check_labels(y, n_samples)?;
        self.params.validate()?;

        let (classes, encoded) = encode_labels(y);
        let target = GrowTarget::Classes {
            encoded: &encoded,
            n_classes: classes.len(),
            criterion: self.criterion,
        };
        let config = self
            .params
            .grow_config(n_features, SplitStrategy::ExtremelyRandomized);
        let estimators = fit_members(
            x,
            &target,
            &config,
            Resampling::None,
            self.params.n_estimators,
            self.params.n_threads,
            self.seed,
        );
        self.feature_importances = combined_importances(&estimators, n_features);
        self.classes = classes;
        self.n_features = n_features;
        self.estimators = estimators;
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for ExtraTreesClassifier<T> {
    type Output = Vec<i64>;

    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Vec<i64>> {
        let trees = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        Ok(plurality_vote(trees, x, self.classes.len())
            .into_iter()
            .map(|class| self.classes[class])
            .collect())
    }
}

impl<T: Float> Score<Tensor<T>, [i64]> for ExtraTreesClassifier<T> {
    fn score(&self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        check_labels(y, pred.len())?;
        Ok(accuracy(y, &pred))
    }
}

impl<T: Float> Persist for ExtraTreesClassifier<T> {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct ExtraTreesRegressor<T: Float> {
    criterion: RegressionCriterion,
    params: ForestParams,
    seed: u64,
    n_features: usize,
    n_outputs: usize,
    y_ndim: usize,
    feature_importances: Vec<T>,
    estimators: Vec<Tree<T>>,
}

impl<T: Float> ExtraTreesRegressor<T> {
    pub fn new(criterion: RegressionCriterion, params: ForestParams) -> Self {
        let seed = resolve_seed(params.seed);
        ExtraTreesRegressor {
            criterion,
            params,
            seed,
            n_features: 0,
            n_outputs: 0,
            y_ndim: 1,
            feature_importances: Vec::new(),
            estimators: Vec::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn estimators(&self) -> &[Tree<T>] {
        &self.estimators
    }

    fn fitted(&self) -> EstimatorResult<&[Tree<T>]> {
        if self.estimators.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        Ok(&self.estimators)
    }

    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let trees = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        Ok(apply_members(trees, x)?)
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        self.fitted()?;
        Ok(&self.feature_importances)
    }
}

impl<T: Float> Fit<Tensor<T>, Tensor<T>> for ExtraTreesRegressor<T> {
    fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<&mut Self> {
        let (n_samples, n_features) = check_sample_matrix(x)?;
        let n_outputs = check_targets(y, n_samples)?;
        self.params.validate()?;

        let target = GrowTarget::Values {
            y,
            n_outputs,
            criterion: self.criterion,
        };
        let config = self
            .params
            .grow_config(n_features, SplitStrategy::ExtremelyRandomized);
        let estimators = fit_members(
            x,
            &target,
            &config,
            Resampling::None,
            self.params.n_estimators,
            self.params.n_threads,
            self.seed,
        );
        self.feature_importances = combined_importances(&estimators, n_features);
        self.n_features = n_features;
        self.n_outputs = n_outputs;
        self.y_ndim = y.ndim();
        self.estimators = estimators;
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for ExtraTreesRegressor<T> {
    type Output = Tensor<T>;

    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let trees = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        let mean = mean_matrix(trees, x, self.n_outputs)?;
        if self.y_ndim == 1 {
            let n = x.shape().dims()[0];
            Ok(mean.reshape(vec![n])?)
        } else {
            Ok(mean)
        }
    }
}

impl<T: Float> Score<Tensor<T>, Tensor<T>> for ExtraTreesRegressor<T> {
    fn score(&self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        Ok(r2_score(y, &pred))
    }
}

impl<T: Float> Persist for ExtraTreesRegressor<T> {}
