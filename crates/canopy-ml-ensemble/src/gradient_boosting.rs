//! Gradient boosting classifier and regressor.
//!
//! Stagewise additive modelling over gradient trees. The classifier boosts
//! the logistic loss on `{-1, +1}` targets, one series for binary problems
//! and one-vs-rest series combined by softmax for multiclass. The regressor
//! boosts squared error. Shrinkage is baked into gradient-tree leaf outputs,
//! so each round adds raw tree predictions.

use crate::bagging::apply_members;
use crate::parallel::run_with_threads;
use canopy_ml_core::sampling::{resolve_seed, sample_without_replacement};
use canopy_ml_core::validation::{
    check_feature_count, check_labels, check_sample_matrix, check_targets, encode_labels,
    require_fraction, require_non_negative_f64, require_positive, require_positive_f64,
};
use canopy_ml_core::{
    EstimatorError, EstimatorResult, Fit, Float, Persist, Predict, Score, Tensor,
};
use canopy_ml_metrics::{accuracy, r2_score};
use canopy_ml_tree::{GradientTreeParams, GradientTreeRegressor, Tree, TreeParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Hyperparameters shared by the boosting estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    /// Boosting rounds per series.
    pub n_estimators: usize,
    /// Learning rate applied inside gradient-tree leaves.
    pub shrinkage_rate: f64,
    /// Fraction of rows (without replacement) each round trains on, `(0, 1]`.
    pub subsample: f64,
    /// L2 regularization of leaf outputs and split gains.
    pub reg_lambda: f64,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub max_leaf_nodes: Option<usize>,
    /// Per-class fan-out for the multiclass classifier; 0 = all cores,
    /// 1 = sequential. The binary classifier and the regressor are
    /// inherently sequential and ignore it.
    pub n_threads: usize,
    pub seed: Option<u64>,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        GradientBoostingParams {
            n_estimators: 100,
            shrinkage_rate: 0.1,
            subsample: 1.0,
            reg_lambda: 0.0,
            max_depth: Some(3),
            min_samples_leaf: 1,
            max_features: None,
            max_leaf_nodes: None,
            n_threads: 1,
            seed: None,
        }
    }
}

impl GradientBoostingParams {
    fn validate(&self) -> EstimatorResult<()> {
        require_positive("n_estimators", self.n_estimators)?;
        require_positive_f64("shrinkage_rate", self.shrinkage_rate)?;
        require_fraction("subsample", self.subsample)?;
        require_non_negative_f64("reg_lambda", self.reg_lambda)?;
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

    fn tree_params(&self, seed: u64) -> GradientTreeParams {
        GradientTreeParams {
            tree: TreeParams {
                max_depth: self.max_depth,
                min_samples_leaf: self.min_samples_leaf,
                max_features: self.max_features,
                max_leaf_nodes: self.max_leaf_nodes,
                seed: Some(seed),
            },
            reg_lambda: self.reg_lambda,
            shrinkage_rate: self.shrinkage_rate,
        }
    }
}

/// One boosted series: a base score plus the trees of every round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
struct BoostedSeries<T: Float> {
    base: T,
    trees: Vec<Tree<T>>,
}

impl<T: Float> BoostedSeries<T> {
    /// Additive score per sample: base plus the sum of tree outputs.
    fn raw_scores(&self, x: &Tensor<T>) -> Vec<T> {
        let n = x.shape().dims()[0];
        let mut scores = vec![self.base; n];
        for tree in &self.trees {
            for (row, score) in scores.iter_mut().enumerate() {
                *score += tree.predict_row(x, row)[0];
            }
        }
        scores
    }
}

/// Runs the boosting rounds for one series.
///
/// `grad_hess` evaluates the loss gradient/hessian for a sample at the
/// current additive score. Each round fits a [`GradientTreeRegressor`] on
/// the (optionally subsampled) rows, but every row's running score is
/// updated, keeping residuals consistent across rounds.
fn boost_series<T: Float>(
    x: &Tensor<T>,
    params: &GradientBoostingParams,
    seed: u64,
    base: T,
    grad_hess: impl Fn(usize, T) -> (T, T),
) -> EstimatorResult<BoostedSeries<T>> {
    let n = x.shape().dims()[0];
    let n_features = x.shape().dims()[1];
    let subset_size = ((params.subsample * n as f64) as usize).max(1);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut f = vec![base; n];
    let mut grad = vec![T::ZERO; n];
    let mut hess = vec![T::ZERO; n];
    let mut trees = Vec::with_capacity(params.n_estimators);

    for _round in 0..params.n_estimators {
        for i in 0..n {
            let (g, h) = grad_hess(i, f[i]);
            grad[i] = g;
            hess[i] = h;
        }
        let subset = (params.subsample < 1.0)
            .then(|| sample_without_replacement(&mut rng, n, subset_size));
        let tree_seed: u64 = rng.gen();
        let mut learner = GradientTreeRegressor::new(params.tree_params(tree_seed));
        match &subset {
            Some(indices) => {
                let data = x.data();
                let mut rows = Vec::with_capacity(indices.len() * n_features);
                let mut grad_sub = Vec::with_capacity(indices.len());
                let mut hess_sub = Vec::with_capacity(indices.len());
                for &i in indices {
                    rows.extend_from_slice(&data[i * n_features..(i + 1) * n_features]);
                    grad_sub.push(grad[i]);
                    hess_sub.push(hess[i]);
                }
                let x_sub = Tensor::new(rows, vec![indices.len(), n_features])?;
                learner.fit(&x_sub, &grad_sub, &hess_sub)?;
            }
            None => {
                learner.fit(x, &grad, &hess)?;
            }
        }
        let tree = learner.tree()?.clone();
        for (row, score) in f.iter_mut().enumerate() {
            *score += tree.predict_row(x, row)[0];
        }
        trees.push(tree);
    }

    Ok(BoostedSeries { base, trees })
}

/// Logistic-loss gradient/hessian at score `f` for target `y` in `{-1, +1}`.
///
/// Written in terms of `s = sigmoid(-2yf)` so extreme scores underflow to
/// zero instead of overflowing through `exp`.
fn logistic_grad_hess<T: Float>(y: T, f: T) -> (T, T) {
    let s = T::ONE / (T::ONE + (T::TWO * y * f).exp());
    let four = T::TWO * T::TWO;
    (-(T::TWO) * y * s, four * s * (T::ONE - s))
}

/// Log-odds base score for `{-1, +1}` targets.
fn log_odds_base<T: Float>(y_sign: &[T]) -> T {
    let mean: T = y_sign.iter().copied().sum::<T>() / T::from_usize(y_sign.len());
    T::HALF * ((T::ONE + mean) / (T::ONE - mean)).ln()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct GradientBoostingClassifier<T: Float> {
    params: GradientBoostingParams,
    seed: u64,
    classes: Vec<i64>,
    n_features: usize,
    feature_importances: Vec<T>,
    series: Vec<BoostedSeries<T>>,
}

impl<T: Float> GradientBoostingClassifier<T> {
    pub fn new(params: GradientBoostingParams) -> Self {
        let seed = resolve_seed(params.seed);
        GradientBoostingClassifier {
            params,
            seed,
            classes: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Boosting rounds actually stored (per series).
    pub fn n_rounds(&self) -> usize {
        self.series.first().map_or(0, |s| s.trees.len())
    }

    fn fitted(&self) -> EstimatorResult<&[BoostedSeries<T>]> {
        if self.series.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        Ok(&self.series)
    }

    /// Additive scores: `[n]` for binary problems, `[n, n_classes]` for
    /// multiclass one-vs-rest.
    pub fn decision_function(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let series = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        let n = x.shape().dims()[0];
        if series.len() == 1 {
            return Ok(Tensor::from_slice(&series[0].raw_scores(x)));
        }
        let k = series.len();
        let mut scores = vec![T::ZERO; n * k];
        for (class, series) in series.iter().enumerate() {
            for (row, &score) in series.raw_scores(x).iter().enumerate() {
                scores[row * k + class] = score;
            }
        }
        Ok(Tensor::new(scores, vec![n, k])?)
    }

    /// `[n, n_classes]`; binary uses the closed-form logistic probability,
    /// multiclass a softmax over per-class scores.
    pub fn predict_proba(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let df = self.decision_function(x)?;
        if self.series.len() == 1 {
            let positive = df.mul_scalar(T::TWO).sigmoid();
            let mut data = Vec::with_capacity(positive.numel() * 2);
            for &p in positive.data() {
                data.push(T::ONE - p);
                data.push(p);
            }
            let n = positive.numel();
            return Ok(Tensor::new(data, vec![n, 2])?);
        }
        Ok(df.softmax_axis(1)?)
    }

    /// Leaf ids per round: `[n, n_rounds]` for binary,
    /// `[n, n_rounds, n_classes]` for multiclass.
    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let series = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        if series.len() == 1 {
            return Ok(apply_members(&series[0].trees, x)?);
        }
        let n = x.shape().dims()[0];
        let k = series.len();
        let rounds = series[0].trees.len();
        let mut data = Vec::with_capacity(n * rounds * k);
        for row in 0..n {
            for round in 0..rounds {
                for series in series {
                    data.push(T::from_usize(series.trees[round].apply_row(x, row)));
                }
            }
        }
        Ok(Tensor::new(data, vec![n, rounds, k])?)
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        self.fitted()?;
        Ok(&self.feature_importances)
    }
}

impl<T: Float> Fit<Tensor<T>, [i64]> for GradientBoostingClassifier<T> {
    fn fit(&mut self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<&mut Self> {
        let (n_samples, n_features) = check_sample_matrix(x)?;
        check_labels(y, n_samples)?;
        self.params.validate()?;

        let (classes, encoded) = encode_labels(y);
        let k = classes.len();
        if k < 2 {
            return Err(EstimatorError::Validation(
                "gradient boosting needs at least two classes".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let params = &self.params;
        let series = if k == 2 {
            let series_seed: u64 = rng.gen();
            let y_sign: Vec<T> = encoded
                .iter()
                .map(|&e| if e == 1 { T::ONE } else { T::NEG_ONE })
                .collect();
            let base = log_odds_base(&y_sign);
            vec![boost_series(x, params, series_seed, base, |i, f| {
                logistic_grad_hess(y_sign[i], f)
            })?]
        } else {
            // Per-class seeds are drawn before any dispatch, so the fan-out
            // yields the same model in parallel and sequential runs.
            let seeds: Vec<(usize, u64)> = (0..k).map(|class| (class, rng.gen())).collect();
            let encoded = &encoded;
            run_with_threads(params.n_threads, move |parallelism| {
                parallelism.maybe_par_map(seeds, |(class, series_seed)| {
                    let y_sign: Vec<T> = encoded
                        .iter()
                        .map(|&e| if e == class { T::ONE } else { T::NEG_ONE })
                        .collect();
                    let base = log_odds_base(&y_sign);
                    boost_series(x, params, series_seed, base, |i, f| {
                        logistic_grad_hess(y_sign[i], f)
                    })
                })
            })
            .into_iter()
            .collect::<EstimatorResult<Vec<_>>>()?
        };

        let mut importances = vec![T::ZERO; n_features];
        for series in &series {
            for tree in &series.trees {
                for (slot, &value) in importances.iter_mut().zip(tree.feature_importances().iter())
                {
                    *slot += value;
                }
            }
        }
        let total: T = importances.iter().copied().sum();
        if total > T::ZERO {
            for value in &mut importances {
                *value /= total;
            }
        }

        self.classes = classes;
        self.n_features = n_features;
        self.feature_importances = importances;
        self.series = series;
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for GradientBoostingClassifier<T> {
    type Output = Vec<i64>;

    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Vec<i64>> {
        let df = self.decision_function(x)?;
        if self.series.len() == 1 {
            return Ok(df
                .data()
                .iter()
                .map(|&score| {
                    if score > T::ZERO {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                })
                .collect());
        }
        let k = self.classes.len();
        Ok(df
            .data()
            .chunks_exact(k)
            .map(|row| {
                let mut best = 0;
                for (class, &score) in row.iter().enumerate() {
                    if score > row[best] {
                        best = class;
                    }
                }
                self.classes[best]
            })
            .collect())
    }
}

impl<T: Float> Score<Tensor<T>, [i64]> for GradientBoostingClassifier<T> {
    fn score(&self, x: &Tensor<T>, y: &[i64]) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        check_labels(y, pred.len())?;
        Ok(accuracy(y, &pred))
    }
}

impl<T: Float> Persist for GradientBoostingClassifier<T> {}

/// Squared-error gradient boosting for 1-D targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct GradientBoostingRegressor<T: Float> {
    params: GradientBoostingParams,
    seed: u64,
    n_features: usize,
    feature_importances: Vec<T>,
    series: Option<BoostedSeries<T>>,
}

impl<T: Float> GradientBoostingRegressor<T> {
    pub fn new(params: GradientBoostingParams) -> Self {
        let seed = resolve_seed(params.seed);
        GradientBoostingRegressor {
            params,
            seed,
            n_features: 0,
            feature_importances: Vec::new(),
            series: None,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_rounds(&self) -> usize {
        self.series.as_ref().map_or(0, |s| s.trees.len())
    }

    fn fitted(&self) -> EstimatorResult<&BoostedSeries<T>> {
        self.series.as_ref().ok_or(EstimatorError::NotFitted)
    }

    /// Leaf ids per round, `[n, n_rounds]`.
    pub fn apply(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let series = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        Ok(apply_members(&series.trees, x)?)
    }

    pub fn feature_importances(&self) -> EstimatorResult<&[T]> {
        self.fitted()?;
        Ok(&self.feature_importances)
    }
}

impl<T: Float> Fit<Tensor<T>, Tensor<T>> for GradientBoostingRegressor<T> {
    fn fit(&mut self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<&mut Self> {
        let (n_samples, n_features) = check_sample_matrix(x)?;
        check_targets(y, n_samples)?;
        if y.ndim() != 1 {
            return Err(EstimatorError::Validation(
                "gradient boosting expects a 1-D target".into(),
            ));
        }
        self.params.validate()?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let series_seed: u64 = rng.gen();
        let base = y.mean_all();
        let targets = y.data();
        let series = boost_series(x, &self.params, series_seed, base, |i, f| {
            (T::TWO * (f - targets[i]), T::TWO)
        })?;

        let mut importances = vec![T::ZERO; n_features];
        for tree in &series.trees {
            for (slot, &value) in importances.iter_mut().zip(tree.feature_importances().iter()) {
                *slot += value;
            }
        }
        let total: T = importances.iter().copied().sum();
        if total > T::ZERO {
            for value in &mut importances {
                *value /= total;
            }
        }

        self.n_features = n_features;
        self.feature_importances = importances;
        self.series = Some(series);
        Ok(self)
    }
}

impl<T: Float> Predict<Tensor<T>> for GradientBoostingRegressor<T> {
    type Output = Tensor<T>;

    /// Additive score per sample, `[n]`.
    fn predict(&self, x: &Tensor<T>) -> EstimatorResult<Tensor<T>> {
        let series = self.fitted()?;
        check_feature_count(x, self.n_features)?;
        Ok(Tensor::from_slice(&series.raw_scores(x)))
    }
}

impl<T: Float> Score<Tensor<T>, Tensor<T>> for GradientBoostingRegressor<T> {
    fn score(&self, x: &Tensor<T>, y: &Tensor<T>) -> EstimatorResult<f64> {
        let pred = self.predict(x)?;
        Ok(r2_score(y, &pred))
    }
}

impl<T: Float> Persist for GradientBoostingRegressor<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use canopy_ml_core::Snapshot;

    fn binary_clusters() -> (Tensor<f64>, Vec<i64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let offset = i as f64 * 0.1;
            rows.push(vec![-4.0 - offset]);
            labels.push(0);
            rows.push(vec![4.0 + offset]);
            labels.push(1);
        }
        (Tensor::from_vec2d(&rows).unwrap(), labels)
    }

    fn three_clusters() -> (Tensor<f64>, Vec<i64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            let offset = i as f64 * 0.1;
            rows.push(vec![offset, offset]);
            labels.push(0);
            rows.push(vec![10.0 + offset, 1.0 - offset]);
            labels.push(1);
            rows.push(vec![20.0 + offset, offset * 2.0]);
            labels.push(2);
        }
        (Tensor::from_vec2d(&rows).unwrap(), labels)
    }

    fn quick_params(n_estimators: usize, seed: u64) -> GradientBoostingParams {
        GradientBoostingParams {
            n_estimators,
            shrinkage_rate: 0.3,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_binary_separable() {
        let (x, y) = binary_clusters();
        let mut model = GradientBoostingClassifier::new(quick_params(10, 0));
        model.fit(&x, &y).unwrap();
        assert_relative_eq!(model.score(&x, &y).unwrap(), 1.0);
        assert_eq!(model.n_rounds(), 10);

        let df = model.decision_function(&x).unwrap();
        assert_eq!(df.shape_vec(), vec![16]);
        for (i, &label) in y.iter().enumerate() {
            let score = df.data()[i];
            if label == 1 {
                assert!(score > 0.0);
            } else {
                assert!(score < 0.0);
            }
        }
    }

    #[test]
    fn test_binary_proba_matches_sigmoid_of_score() {
        let (x, y) = binary_clusters();
        let mut model = GradientBoostingClassifier::new(quick_params(5, 3));
        model.fit(&x, &y).unwrap();

        let df = model.decision_function(&x).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape_vec(), vec![16, 2]);
        for i in 0..16 {
            let expected = 1.0 / (1.0 + (-2.0 * df.data()[i]).exp());
            assert_relative_eq!(proba.get(&[i, 1]).unwrap(), expected, epsilon = 1e-12);
            assert_relative_eq!(
                proba.get(&[i, 0]).unwrap() + proba.get(&[i, 1]).unwrap(),
                1.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_multiclass_softmax() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(quick_params(10, 7));
        model.fit(&x, &y).unwrap();
        assert_relative_eq!(model.score(&x, &y).unwrap(), 1.0);

        let df = model.decision_function(&x).unwrap();
        assert_eq!(df.shape_vec(), vec![18, 3]);
        let proba = model.predict_proba(&x).unwrap();
        for &s in proba.sum_axis(1).unwrap().data() {
            assert_relative_eq!(s, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_multiclass_parallel_matches_sequential() {
        let (x, y) = three_clusters();
        let mut sequential = GradientBoostingClassifier::<f64>::new(GradientBoostingParams {
            n_threads: 1,
            ..quick_params(6, 9)
        });
        let mut parallel = GradientBoostingClassifier::<f64>::new(GradientBoostingParams {
            n_threads: 3,
            ..quick_params(6, 9)
        });
        sequential.fit(&x, &y).unwrap();
        parallel.fit(&x, &y).unwrap();

        assert_eq!(
            sequential.decision_function(&x).unwrap(),
            parallel.decision_function(&x).unwrap()
        );
        assert_eq!(
            sequential.feature_importances().unwrap(),
            parallel.feature_importances().unwrap()
        );
    }

    #[test]
    fn test_apply_shapes() {
        let (x, y) = binary_clusters();
        let mut binary = GradientBoostingClassifier::new(quick_params(4, 2));
        binary.fit(&x, &y).unwrap();
        assert_eq!(binary.apply(&x).unwrap().shape_vec(), vec![16, 4]);

        let (x3, y3) = three_clusters();
        let mut multi = GradientBoostingClassifier::new(quick_params(4, 2));
        multi.fit(&x3, &y3).unwrap();
        assert_eq!(multi.apply(&x3).unwrap().shape_vec(), vec![18, 4, 3]);
    }

    #[test]
    fn test_subsample_fits_deterministically() {
        let (x, y) = binary_clusters();
        let params = GradientBoostingParams {
            subsample: 0.5,
            ..quick_params(8, 11)
        };
        let mut a = GradientBoostingClassifier::<f64>::new(params.clone());
        let mut b = GradientBoostingClassifier::<f64>::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(
            a.decision_function(&x).unwrap(),
            b.decision_function(&x).unwrap()
        );
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Tensor::from_vec2d(&[vec![0.0], vec![1.0]]).unwrap();
        let y = vec![5, 5];
        let mut model = GradientBoostingClassifier::<f64>::new(quick_params(3, 0));
        assert!(matches!(
            model.fit(&x, &y),
            Err(EstimatorError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_hyperparameters_rejected() {
        let (x, y) = binary_clusters();
        let mut zero_subsample = GradientBoostingClassifier::<f64>::new(GradientBoostingParams {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            zero_subsample.fit(&x, &y),
            Err(EstimatorError::Validation(_))
        ));

        let mut negative_lambda = GradientBoostingClassifier::<f64>::new(GradientBoostingParams {
            reg_lambda: -0.5,
            ..Default::default()
        });
        assert!(matches!(
            negative_lambda.fit(&x, &y),
            Err(EstimatorError::Validation(_))
        ));
    }

    #[test]
    fn test_regressor_drives_residuals_down() {
        let x = Tensor::from_vec2d(&[
            vec![0.0],
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![10.0],
            vec![11.0],
            vec![12.0],
            vec![13.0],
        ])
        .unwrap();
        let y = Tensor::from_slice(&[1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 9.0, 9.0]);
        let mut model = GradientBoostingRegressor::new(GradientBoostingParams {
            n_estimators: 20,
            shrinkage_rate: 0.5,
            max_depth: Some(2),
            seed: Some(4),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.99);
        let pred = model.predict(&x).unwrap();
        assert_eq!(pred.shape_vec(), vec![8]);
        assert_eq!(model.apply(&x).unwrap().shape_vec(), vec![8, 20]);
    }

    #[test]
    fn test_single_round_matches_gradient_tree() {
        let x = Tensor::from_vec2d(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = Tensor::from_slice(&[0.0, 0.0, 10.0, 10.0]);
        let params = GradientBoostingParams {
            n_estimators: 1,
            shrinkage_rate: 0.5,
            seed: Some(31),
            ..Default::default()
        };
        let mut model = GradientBoostingRegressor::new(params.clone());
        model.fit(&x, &y).unwrap();

        // Replay the seed chain (ensemble seed -> series seed -> tree seed)
        // and fit one gradient tree on the round-one squared-error
        // gradients by hand; the boosted prediction must be base plus that
        // tree's step.
        let mut rng = StdRng::seed_from_u64(model.seed());
        let series_seed: u64 = rng.gen();
        let mut series_rng = StdRng::seed_from_u64(series_seed);
        let tree_seed: u64 = series_rng.gen();

        let base = y.mean_all();
        let grad: Vec<f64> = y.data().iter().map(|&t| 2.0 * (base - t)).collect();
        let hess = vec![2.0; 4];
        let mut learner = GradientTreeRegressor::new(GradientTreeParams {
            tree: TreeParams {
                max_depth: params.max_depth,
                min_samples_leaf: params.min_samples_leaf,
                max_features: params.max_features,
                max_leaf_nodes: params.max_leaf_nodes,
                seed: Some(tree_seed),
            },
            reg_lambda: params.reg_lambda,
            shrinkage_rate: params.shrinkage_rate,
        });
        learner.fit(&x, &grad, &hess).unwrap();

        let steps = learner.predict(&x).unwrap();
        let expected: Vec<f64> = steps.data().iter().map(|&step| base + step).collect();
        assert_eq!(model.predict(&x).unwrap().data(), expected.as_slice());
    }

    #[test]
    fn test_regressor_rejects_2d_targets() {
        let x = Tensor::from_vec2d(&[vec![0.0], vec![1.0]]).unwrap();
        let y = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let mut model = GradientBoostingRegressor::<f64>::new(GradientBoostingParams::default());
        assert!(matches!(
            model.fit(&x, &y),
            Err(EstimatorError::Validation(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(quick_params(5, 13));
        model.fit(&x, &y).unwrap();

        let snapshot: Snapshot = model.to_snapshot().unwrap();
        let restored = GradientBoostingClassifier::<f64>::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
        assert_eq!(
            restored.predict_proba(&x).unwrap(),
            model.predict_proba(&x).unwrap()
        );
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(quick_params(6, 21));
        model.fit(&x, &y).unwrap();
        let importances = model.feature_importances().unwrap();
        let total: f64 = importances.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }
}
