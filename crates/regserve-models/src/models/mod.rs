pub mod factory;
pub mod linear;
pub mod logistic;
pub mod regressor_trait;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use linear::LinearModel;
use logistic::LogisticModel;
use regressor_trait::RegressionModel;

/// A model the registry can hold: one variant per supported `ModelType`.
/// This is the value that gets serialised to disk.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Linear(LinearModel),
    Logistic(LogisticModel),
}

impl RegressionModel for Model {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        match self {
            Model::Linear(m) => m.fit(x, y),
            Model::Logistic(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        match self {
            Model::Linear(m) => m.predict(x),
            Model::Logistic(m) => m.predict(x),
        }
    }

    fn n_features(&self) -> Option<usize> {
        match self {
            Model::Linear(m) => m.n_features(),
            Model::Logistic(m) => m.n_features(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Model::Linear(m) => m.name(),
            Model::Logistic(m) => m.name(),
        }
    }
}
