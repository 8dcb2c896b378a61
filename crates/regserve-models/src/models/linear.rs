use std::fmt;

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_linear::{Link, TweedieRegressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::LinearParams;
use crate::error::ModelError;
use crate::models::regressor_trait::RegressionModel;

/// Least-squares linear regression.
///
/// Fitted as a Tweedie GLM with power 0 and identity link, which is the
/// Normal-distribution case: the optimum is the (optionally L2-penalised)
/// least-squares solution. Unlike the normal-equation solver this stays
/// well-defined when columns are collinear or there are fewer samples than
/// parameters.
#[derive(Serialize, Deserialize)]
pub struct LinearModel {
    params: LinearParams,
    model: Option<TweedieRegressor<f64>>,
    n_features: Option<usize>,
}

impl LinearModel {
    pub fn new(params: LinearParams) -> Self {
        LinearModel {
            params,
            model: None,
            n_features: None,
        }
    }

    pub fn params(&self) -> &LinearParams {
        &self.params
    }
}

impl fmt::Debug for LinearModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearModel")
            .field("params", &self.params)
            .field("fitted", &self.model.is_some())
            .field("n_features", &self.n_features)
            .finish()
    }
}

impl RegressionModel for LinearModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        let dataset = Dataset::new(x.to_owned(), y.to_owned());

        let fitted = TweedieRegressor::params()
            .power(0.0)
            .link(Link::Identity)
            .alpha(self.params.alpha)
            .fit_intercept(self.params.fit_intercept)
            .max_iter(self.params.max_iter)
            .tol(self.params.tol)
            .fit(&dataset)
            .map_err(|e| ModelError::FitFailed(e.to_string()))?;

        self.model = Some(fitted);
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        self.check_features(x)?;
        let model = self.model.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(model.predict(x))
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn name(&self) -> &str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_fits_a_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 3.0, 5.0, 7.0, 9.0, 11.0];

        let mut model = LinearModel::new(LinearParams::default());
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&array![[6.0], [10.0]]).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!((predictions[0] - 13.0).abs() < 0.1, "got {}", predictions[0]);
        assert!((predictions[1] - 21.0).abs() < 0.2, "got {}", predictions[1]);
    }

    #[test]
    fn test_linear_collinear_example() {
        // Two samples, two perfectly collinear columns plus an intercept.
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![5.0, 6.0];

        let mut model = LinearModel::new(LinearParams::default());
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&array![[5.0, 6.0], [7.0, 8.0]]).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearModel::new(LinearParams::default());
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_feature_mismatch() {
        let mut model = LinearModel::new(LinearParams::default());
        model
            .fit(&array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]], &array![1.0, 2.0, 3.0])
            .unwrap();
        let err = model.predict(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, ModelError::FeatureMismatch { expected: 2, got: 3 }));
    }
}
