//! Decision tree classifier and regressor with exact split search.

use crate::grower::{grow, GrowConfig};
use crate::split::{ClassificationCriterion, GrowTarget, RegressionCriterion, SplitStrategy};
use crate::tree::Tree;

use canopy_ml_core::sampling::resolve_seed;
use canopy_ml_core::validation::{
    check_feature_count, check_labels, check_sample_matrix, check_targets, encode_labels,
    require_positive,
};
use canopy_ml_core::{
    EstimatorError, EstimatorResult, Fit, Float, Persist, Predict, Score, Tensor,
};
use canopy_ml_metrics::{accuracy, r2_score};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Structural hyperparameters shared by the tree estimators.
///
/// Build with struct-update syntax over `Default::default()`:
///
/// ```
/// use canopy_ml_tree::TreeParams;
///
/// let params = TreeParams { max_depth: Some(3), ..Default::default() };
/// assert_eq!(params.min_samples_leaf, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum node depth; `None` grows until other stops apply.
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Features evaluated per split search; `None` means all features.
    pub max_features: Option<usize>,
    /// Leaf budget; when set, growth is best-first by pending gain.
    pub max_leaf_nodes: Option<usize>,
    /// RNG seed; `None` draws one from process entropy at construction.
    pub seed: Option<u64>,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            max_leaf_nodes: None,
            seed: None,
        }
    }
}

impl TreeParams {
    pub(crate) fn validate(&self) -> EstimatorResult<()> {
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

    pub(crate) fn grow_config(&self, strategy: SplitStrategy) -> GrowConfig {
        GrowConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            max_leaf_nodes: self.max_leaf_nodes,
            strategy,
        }
    }
}

/// CART-style classifier: exact midpoint split search over sorted feature
/// values, leaves holding class frequencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct DecisionTreeClassifier<T: Float> {
    criterion: ClassificationCriterion,
    params: TreeParams,
    seed: u64,
    classes: Vec<i64>,
    tree: Option<Tree<T>>,
}

impl<T: Float> DecisionTreeClassifier<T> {
    pub fn new(criterion: ClassificationCriterion, params: TreeParams) -> Self {
        let seed = resolve_seed(params.seed);
        DecisionTreeClassifier {
            criterion,
            params,
            seed,
            classes: Vec::new(),
            tree: None,
        }
    }

    /// Sorted distinct labels seen at fit; the canonical class-column order.
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Seed resolved at construction.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn fitted(&self) -> EstimatorResult<&Tree<T>> {
        self.tree.as_ref().ok_or(EstimatorError::NotFitted)
    }

    /// The fitted tree structure.
    pub fn tree(&self) -> EstimatorResult<&Tree<T>> {
        self.fitted()
    }

    /// Per-sample class frequencies of the leaf reached, `[n, n_classes]`.
    pub fn predict_proba(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        Ok(tree.predict_matrix(x)?)
    }

    /// `leaf_id` reached by each sample.
    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Vec<usize>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        Ok(tree.apply(x))
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        Ok(self.fitted()?.feature_importances())
    }
}

impl<T: Float> Fit<Tensor<T>, [i64]> for DecisionTreeClassifier<T> {
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
            &self.params.grow_config(SplitStrategy::Standard),
            &mut rng,
        );
        self.classes = classes;
        self.tree = Some(tree);
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for DecisionTreeClassifier<T> {
    type Output = Vec<i64>;

    /// Majority class of the leaf reached by each sample.
    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Vec<i64>> {
        let tree = self.fitted()?;
        check_feature_count(x, tree.n_features())?;
        let n = x.shape().dims()[0];
        Ok((0..n)
            .map(|row| self.classes[tree.predict_index(x, row)])
            .collect())
    }
}

impl<T: Float> Score<Tensor<T>, [i64]> for DecisionTreeClassifier<T> {
    fn score(&self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        check_labels(y, pred.len())?;
        Ok(accuracy(y, &pred))
    }
}

impl<T: Float> Persist for DecisionTreeClassifier<T> {}

/// CART-style regressor; supports multi-output targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct DecisionTreeRegressor<T: Float> {
    criterion: RegressionCriterion,
    params: TreeParams,
    seed: u64,
    y_ndim: usize,
    tree: Option<Tree<T>>,
}

impl<T: Float> DecisionTreeRegressor<T> {
    pub fn new(criterion: RegressionCriterion, params: TreeParams) -> Self {
        let seed = resolve_seed(params.seed);
        DecisionTreeRegressor {
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

impl<T: Float> Fit<Tensor<T>, Tensor<T>> for DecisionTreeRegressor<T> {
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
            &self.params.grow_config(SplitStrategy::Standard),
            &mut rng,
        );
        self.y_ndim = y.ndim();
        self.tree = Some(tree);
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for DecisionTreeRegressor<T> {
    type Output = Tensor<T>;

    /// Leaf mean for each sample: `[n]` for 1-D targets, `[n, k]` otherwise.
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

impl<T: Float> Score<Tensor<T>, Tensor<T>> for DecisionTreeRegressor<T> {
    fn score(&self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        Ok(r2_score(y, &pred))
    }
}

impl<T: Float> Persist for DecisionTreeRegressor<T> {}
