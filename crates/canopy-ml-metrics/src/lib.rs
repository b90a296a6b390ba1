//! Evaluation metrics for CanopyML estimators.

pub mod classification;
pub mod regression;

pub use classification::*;
pub use regression::*;
