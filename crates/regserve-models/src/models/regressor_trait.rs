use ndarray::{Array1, Array2};

use crate::error::ModelError;

/// A small trait abstraction over the regression models the registry can
/// serve. Implementations wrap a linfa estimator and keep its fitted state
/// next to the hyper-parameters that produced it.
pub trait RegressionModel {
    /// Fit the model on `x` (one sample per row) and targets `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError>;

    /// Predict one value per row of `x`, in row order.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Number of input columns seen at fit time, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "regressor"
    }

    /// Reject inference input whose width differs from the training data.
    fn check_features(&self, x: &Array2<f64>) -> Result<(), ModelError> {
        match self.n_features() {
            None => Err(ModelError::NotFitted),
            Some(expected) if expected != x.ncols() => Err(ModelError::FeatureMismatch {
                expected,
                got: x.ncols(),
            }),
            Some(_) => Ok(()),
        }
    }
}
