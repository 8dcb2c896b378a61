use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::TryFrom;
use std::str::FromStr;

use crate::error::ConfigError;

/// Model configuration as submitted by clients: a free-form type tag and an
/// untyped hyperparameter map. Converted into a [`ModelConfig`] before use.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelSpec {
    pub id: String,
    pub ml_model_type: String,
    #[serde(default)]
    pub hyperparameters: Map<String, Value>,
}

/// Central, validated configuration for a single model.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub id: String,
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Linear(LinearParams),
    Logistic(LogisticParams),
}

/// Least-squares regression. `alpha` is an L2 penalty; zero gives plain OLS.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LinearParams {
    pub fit_intercept: bool,
    pub alpha: f64,
    #[serde(alias = "max_iterations")]
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        LinearParams {
            fit_intercept: true,
            alpha: 0.0,
            max_iter: 100,
            tol: 1e-4,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogisticParams {
    pub fit_intercept: bool,
    pub alpha: f64,
    #[serde(alias = "max_iter")]
    pub max_iterations: u64,
    #[serde(alias = "tol")]
    pub gradient_tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        LogisticParams {
            fit_intercept: true,
            alpha: 1.0,
            max_iterations: 100,
            gradient_tolerance: 1e-4,
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Linear(LinearParams::default())
    }
}

impl ModelType {
    /// The lowercase tag clients use for this model type.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Linear(_) => "linear",
            ModelType::Logistic(_) => "logistic",
        }
    }

    /// Resolve a type tag and fill its parameters from a hyperparameter map.
    ///
    /// scikit-learn spellings are accepted: `copy_X` and `n_jobs` are ignored
    /// and logistic `C` becomes `alpha = 1 / C`. Other unknown keys are
    /// rejected.
    pub fn with_hyperparameters(
        kind: &str,
        hyperparameters: &Map<String, Value>,
    ) -> Result<Self, ConfigError> {
        let mut map = hyperparameters.clone();
        for key in IGNORED_HYPERPARAMETERS {
            if map.remove(*key).is_some() {
                log::debug!("Ignoring hyperparameter '{}'", key);
            }
        }

        let model_type = match kind.parse::<ModelType>()? {
            ModelType::Linear(_) => ModelType::Linear(
                serde_json::from_value(Value::Object(map))
                    .map_err(|e| invalid("linear", e.to_string()))?,
            ),
            ModelType::Logistic(_) => {
                inverse_regularisation_to_alpha(&mut map)
                    .map_err(|reason| invalid("logistic", reason))?;
                ModelType::Logistic(
                    serde_json::from_value(Value::Object(map))
                        .map_err(|e| invalid("logistic", e.to_string()))?,
                )
            }
        };
        model_type.validate()?;
        Ok(model_type)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = match self {
            ModelType::Linear(p) => {
                check_penalty(p.alpha)
                    .and_then(|_| check_tolerance("tol", p.tol))
                    .and_then(|_| check_iterations("max_iter", p.max_iter as u64))
            }
            ModelType::Logistic(p) => check_penalty(p.alpha)
                .and_then(|_| check_tolerance("gradient_tolerance", p.gradient_tolerance))
                .and_then(|_| check_iterations("max_iterations", p.max_iterations)),
        };
        check.map_err(|reason| invalid(self.name(), reason))
    }
}

/// Accepted for compatibility but with no effect on fitting.
const IGNORED_HYPERPARAMETERS: &[&str] = &["copy_X", "n_jobs"];

/// Rewrite scikit-learn's `C` (inverse regularisation strength) as `alpha`.
fn inverse_regularisation_to_alpha(map: &mut Map<String, Value>) -> Result<(), String> {
    let c = match map.remove("C") {
        Some(c) => c,
        None => return Ok(()),
    };
    if map.contains_key("alpha") {
        return Err("C and alpha cannot both be given".to_string());
    }
    match c.as_f64() {
        Some(c) if c.is_finite() && c > 0.0 => {
            map.insert("alpha".to_string(), Value::from(1.0 / c));
            Ok(())
        }
        _ => Err(format!("C must be a finite, positive number, got {}", c)),
    }
}

fn invalid(model_type: &str, reason: String) -> ConfigError {
    ConfigError::InvalidHyperparameters {
        model_type: model_type.to_string(),
        reason,
    }
}

fn check_penalty(alpha: f64) -> Result<(), String> {
    if alpha.is_finite() && alpha >= 0.0 {
        Ok(())
    } else {
        Err(format!("alpha must be a finite, non-negative number, got {}", alpha))
    }
}

fn check_tolerance(field: &str, tol: f64) -> Result<(), String> {
    if tol.is_finite() && tol > 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be a finite, positive number, got {}", field, tol))
    }
}

fn check_iterations(field: &str, n: u64) -> Result<(), String> {
    if n > 0 {
        Ok(())
    } else {
        Err(format!("{} must be greater than zero", field))
    }
}

impl FromStr for ModelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(ModelType::Linear(LinearParams::default())),
            "logistic" => Ok(ModelType::Logistic(LogisticParams::default())),
            _ => Err(ConfigError::UnsupportedModelType(s.to_string())),
        }
    }
}

impl ModelConfig {
    pub fn new(id: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            id: id.into(),
            model_type,
        }
    }
}

impl TryFrom<ModelSpec> for ModelConfig {
    type Error = ConfigError;

    fn try_from(spec: ModelSpec) -> Result<Self, Self::Error> {
        let model_type = ModelType::with_hyperparameters(&spec.ml_model_type, &spec.hyperparameters)?;
        Ok(ModelConfig::new(spec.id, model_type))
    }
}
