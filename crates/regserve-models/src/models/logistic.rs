use std::fmt;

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::LogisticParams;
use crate::error::ModelError;
use crate::models::regressor_trait::RegressionModel;

/// Multinomial logistic regression over the distinct target values.
///
/// Targets arrive as numbers; each distinct value is a class. The estimator
/// works on class indices, so `classes` keeps the index -> value mapping and
/// predictions are always one of the values seen during training.
#[derive(Serialize, Deserialize)]
pub struct LogisticModel {
    params: LogisticParams,
    model: Option<MultiFittedLogisticRegression<f64, usize>>,
    classes: Vec<f64>,
    n_features: Option<usize>,
}

impl LogisticModel {
    pub fn new(params: LogisticParams) -> Self {
        LogisticModel {
            params,
            model: None,
            classes: Vec::new(),
            n_features: None,
        }
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }

    /// Class labels in index order, empty before fitting.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }
}

impl fmt::Debug for LogisticModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogisticModel")
            .field("params", &self.params)
            .field("fitted", &self.model.is_some())
            .field("classes", &self.classes)
            .field("n_features", &self.n_features)
            .finish()
    }
}

// Adding +0.0 turns -0.0 into 0.0 and leaves every other value alone.
fn class_value(v: f64) -> f64 {
    v + 0.0
}

fn distinct_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().map(class_value).collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup_by(|a, b| a.total_cmp(b).is_eq());
    classes
}

fn class_index(classes: &[f64], v: f64) -> Result<usize, ModelError> {
    let v = class_value(v);
    classes
        .binary_search_by(|c| c.total_cmp(&v))
        .map_err(|_| ModelError::InvalidInput(format!("target {} has no class", v)))
}

impl RegressionModel for LogisticModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        let classes = distinct_classes(y);
        if classes.len() < 2 {
            return Err(ModelError::InvalidInput(format!(
                "logistic regression needs at least two distinct target values, got {}",
                classes.len()
            )));
        }

        let labels = y
            .iter()
            .map(|&v| class_index(&classes, v))
            .collect::<Result<Vec<usize>, ModelError>>()
            .map(Array1::from)?;
        let dataset = Dataset::new(x.to_owned(), labels);

        let fitted = MultiLogisticRegression::default()
            .alpha(self.params.alpha)
            .with_intercept(self.params.fit_intercept)
            .max_iterations(self.params.max_iterations)
            .gradient_tolerance(self.params.gradient_tolerance)
            .fit(&dataset)
            .map_err(|e| ModelError::FitFailed(e.to_string()))?;

        self.model = Some(fitted);
        self.classes = classes;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        self.check_features(x)?;
        let model = self.model.as_ref().ok_or(ModelError::NotFitted)?;
        let labels: Array1<usize> = model.predict(x);

        labels
            .iter()
            .map(|&label| {
                self.classes.get(label).copied().ok_or_else(|| {
                    ModelError::InvalidInput(format!("unknown class index {}", label))
                })
            })
            .collect::<Result<Vec<f64>, ModelError>>()
            .map(Array1::from)
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn name(&self) -> &str {
        "logistic"
    }
}
