//! End-to-end registry behaviour over a real model directory.

use std::convert::TryFrom;
use std::time::Duration;

use regserve_models::store::DEFAULT_EXTENSION;
use regserve_models::{
    LoadOutcome, ModelConfig, ModelRegistry, ModelSpec, ModelStore, RegistryError,
};
use serde_json::json;

fn open(dir: &std::path::Path) -> ModelRegistry {
    let store = ModelStore::open(dir, DEFAULT_EXTENSION).unwrap();
    ModelRegistry::new(store).with_fit_delay(Duration::ZERO)
}

fn config(id: &str, kind: &str) -> ModelConfig {
    let spec: ModelSpec = serde_json::from_value(json!({
        "id": id,
        "ml_model_type": kind,
        "hyperparameters": {"fit_intercept": true},
    }))
    .unwrap();
    ModelConfig::try_from(spec).unwrap()
}

#[test]
fn example_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open(dir.path());

    registry
        .fit(
            &config("linear_1", "linear"),
            &[vec![1.0, 2.0], vec![3.0, 4.0]],
            &[5.0, 6.0],
        )
        .unwrap();

    let predictions = registry
        .predict("linear_1", &[vec![5.0, 6.0], vec![7.0, 8.0]])
        .unwrap();
    assert_eq!(predictions.len(), 2);
    assert!(registry.list_models().contains(&"linear_1".to_string()));

    registry.remove_all().unwrap();
    assert!(registry.list_models().is_empty());
}

#[test]
fn restart_then_load_reproduces_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let x = vec![vec![0.0, 1.0], vec![1.0, 0.5], vec![2.0, 2.5], vec![3.0, 1.0]];
    let y = vec![1.0, 2.5, 6.0, 5.5];
    let probe = vec![vec![4.0, 2.0], vec![-1.0, 0.0]];

    let before = {
        let registry = open(dir.path());
        registry.fit(&config("m1", "linear"), &x, &y).unwrap();
        registry.predict("m1", &probe).unwrap()
    };

    // A fresh registry over the same directory simulates a restart.
    let registry = open(dir.path());
    assert!(registry.list_models().is_empty());
    assert_eq!(registry.persisted_ids().unwrap(), vec!["m1"]);
    assert!(matches!(
        registry.predict("m1", &probe),
        Err(RegistryError::ModelNotLoaded(_))
    ));

    assert_eq!(registry.load("m1").unwrap(), LoadOutcome::Loaded);
    assert_eq!(registry.predict("m1", &probe).unwrap(), before);
}

#[test]
fn logistic_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let x = vec![
        vec![0.0, 0.0],
        vec![0.2, 0.1],
        vec![0.1, 0.3],
        vec![3.0, 3.0],
        vec![3.2, 2.8],
        vec![2.9, 3.1],
    ];
    let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

    let before = {
        let registry = open(dir.path());
        registry.fit(&config("clf", "logistic"), &x, &y).unwrap();
        registry.predict("clf", &x).unwrap()
    };

    let registry = open(dir.path());
    registry.load("clf").unwrap();
    assert_eq!(registry.predict("clf", &x).unwrap(), before);
}

#[test]
fn remove_all_forgets_persisted_models() {
    let dir = tempfile::tempdir().unwrap();
    {
        let registry = open(dir.path());
        registry
            .fit(&config("old", "linear"), &[vec![1.0], vec![2.0]], &[1.0, 2.0])
            .unwrap();
    }

    // Persisted-only models are deleted too.
    let registry = open(dir.path());
    assert_eq!(registry.remove_all().unwrap(), 1);
    assert!(matches!(
        registry.load("old"),
        Err(RegistryError::ModelNotFound(_))
    ));
}

#[test]
fn unsupported_model_type_never_reaches_registry() {
    let spec: ModelSpec = serde_json::from_value(json!({
        "id": "x",
        "ml_model_type": "svm",
        "hyperparameters": {},
    }))
    .unwrap();
    let err = ModelConfig::try_from(spec).unwrap_err();
    assert!(err.to_string().contains("svm"));
}

#[test]
fn prediction_width_must_match_training() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open(dir.path());
    registry
        .fit(
            &config("w", "linear"),
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 7.0]],
            &[1.0, 2.0, 3.0],
        )
        .unwrap();
    let err = registry.predict("w", &[vec![1.0]]).unwrap_err();
    assert!(err.is_client_error());
    assert!(err.to_string().contains("features"));
}
