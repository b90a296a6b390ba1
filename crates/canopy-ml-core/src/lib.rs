pub mod dtype;
pub mod error;
pub mod estimator;
pub mod persist;
pub mod sampling;
pub mod shape;
pub mod tensor;
pub mod validation;

pub use dtype::Float;
pub use error::{EstimatorError, EstimatorResult, TensorError, TensorResult};
pub use estimator::{Fit, Predict, Score};
pub use persist::{Persist, Snapshot};
pub use shape::Shape;
pub use tensor::Tensor;
