//! # CanopyML
//!
//! Decision trees and tree ensembles written in pure Rust.
//!
//! ## Modules
//!
//! - **core** — Tensor engine, estimator traits, snapshot persistence, validation
//! - **tree** — Single trees: decision tree (CART), extremely randomized tree, gradient tree
//! - **ensemble** — Random Forest, Extra-Trees, AdaBoost (SAMME.R), Gradient Boosting
//! - **metrics** — Evaluation: accuracy, MSE, RMSE, MAE, R²
//!
//! ## Quick start
//!
//! ```
//! use canopy_ml::core::{Fit, Predict, Tensor};
//! use canopy_ml::ensemble::{ForestParams, RandomForestClassifier};
//! use canopy_ml::tree::ClassificationCriterion;
//!
//! let x = Tensor::from_vec2d(&[
//!     vec![0.0_f64, 0.0],
//!     vec![0.2, 0.1],
//!     vec![0.1, 0.3],
//!     vec![0.3, 0.2],
//!     vec![5.0, 5.0],
//!     vec![5.2, 5.1],
//!     vec![5.1, 5.3],
//!     vec![5.3, 5.2],
//! ]).unwrap();
//! let y = vec![0_i64, 0, 0, 0, 1, 1, 1, 1];
//!
//! let params = ForestParams { n_estimators: 10, seed: Some(7), ..ForestParams::default() };
//! let mut forest = RandomForestClassifier::new(ClassificationCriterion::Gini, params);
//! forest.fit(&x, &y).unwrap();
//! assert_eq!(forest.predict(&x).unwrap(), y);
//! ```

/// Tensor engine, estimator traits, persistence.
pub use canopy_ml_core as core;

/// Single decision trees.
pub use canopy_ml_tree as tree;

/// Tree ensembles.
pub use canopy_ml_ensemble as ensemble;

/// Evaluation metrics.
pub use canopy_ml_metrics as metrics;
