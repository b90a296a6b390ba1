//! Tree ensembles for CanopyML.
//!
//! Forests (bagging over decision or extremely randomized trees), AdaBoost
//! (SAMME.R) and gradient boosting, all built on the tree-growing core in
//! `canopy-ml-tree`. Ensemble members are seeded deterministically from the
//! ensemble seed before any parallel dispatch, so fitted models are identical
//! whether training runs sequentially or on a thread pool.

pub mod adaboost;
pub mod bagging;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod parallel;
pub mod random_forest;

pub use adaboost::*;
pub use bagging::*;
pub use extra_trees::*;
pub use gradient_boosting::*;
pub use parallel::*;
pub use random_forest::*;
