use crate::config::ModelType;
use crate::models::linear::LinearModel;
use crate::models::logistic::LogisticModel;
use crate::models::Model;

/// Build an unfitted model from its `ModelType`.
/// Currently this is a thin factory implemented as a single function.
pub fn build_model(model_type: &ModelType) -> Model {
    match model_type {
        ModelType::Linear(params) => Model::Linear(LinearModel::new(params.clone())),
        ModelType::Logistic(params) => Model::Logistic(LogisticModel::new(params.clone())),
    }
}
