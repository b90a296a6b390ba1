use thiserror::Error;

/// Core error type for all tensor operations.
#[derive(Debug, Error, Clone)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Index out of bounds: index {index} for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Invalid axis: {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Cannot broadcast shapes {a:?} and {b:?}")]
    BroadcastError { a: Vec<usize>, b: Vec<usize> },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Empty tensor")]
    EmptyTensor,
}

pub type TensorResult<T> = Result<T, TensorError>;

/// Error type for estimator fit/predict/persist surfaces.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// Input or hyperparameter failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Predict/apply/accessor called before fit.
    #[error("Estimator has not been fitted; call fit first")]
    NotFitted,

    /// Numerical state from which the algorithm cannot proceed.
    #[error("Numerical degeneracy: {0}")]
    Degenerate(String),

    /// Snapshot serialization or restoration failed.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;
