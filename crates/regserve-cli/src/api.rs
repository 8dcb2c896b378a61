//! REST API for fitting, loading and serving regression models.
//!
//! Endpoints: `POST /fit`, `POST /load`, `POST /predict`, `GET /list_models`
//! and `DELETE /remove_all`. Registry calls run on tokio's blocking pool.

use std::convert::Infallible;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use regserve_models::{ConfigError, ModelConfig, ModelError, ModelRegistry, ModelSpec, RegistryError};

pub type SharedRegistry = Arc<ModelRegistry>;

/// Largest accepted JSON body.
pub const JSON_BODY_LIMIT: u64 = 16 * 1024 * 1024;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FitRequest {
    #[serde(rename = "X")]
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    pub config: ModelSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadRequest {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    pub id: String,
    #[serde(rename = "X")]
    pub x: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PredictResponse {
    pub id: String,
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub detail: String,
    pub code: String,
}

// =============================================================================
// API Routes
// =============================================================================

/// Build the complete API route tree. Pair with [`handle_rejection`] via
/// `.recover(...)` to get JSON error bodies for malformed requests.
pub fn api_routes(
    registry: SharedRegistry,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let fit = warp::path("fit")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<FitRequest>())
        .and(with_registry(registry.clone()))
        .and_then(handle_fit);

    let load = warp::path("load")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<LoadRequest>())
        .and(with_registry(registry.clone()))
        .and_then(handle_load);

    let predict = warp::path("predict")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<PredictRequest>())
        .and(with_registry(registry.clone()))
        .and_then(handle_predict);

    let list = warp::path("list_models")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_registry(registry.clone()))
        .and_then(handle_list);

    let remove_all = warp::path("remove_all")
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_registry(registry))
        .and_then(handle_remove_all);

    fit.or(load).or(predict).or(list).or(remove_all)
}

// =============================================================================
// Filters
// =============================================================================

fn with_registry(
    registry: SharedRegistry,
) -> impl Filter<Extract = (SharedRegistry,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

// =============================================================================
// Handlers
// =============================================================================

async fn handle_fit(
    body: FitRequest,
    registry: SharedRegistry,
) -> Result<warp::reply::Response, Infallible> {
    let FitRequest { x, y, config } = body;

    // An id already in memory is reported before the type is looked at.
    if registry.is_loaded(&config.id) {
        return Ok(registry_error_response(&RegistryError::DuplicateId(
            config.id,
        )));
    }

    let config = match ModelConfig::try_from(config) {
        Ok(config) => config,
        Err(e) => return Ok(registry_error_response(&RegistryError::Config(e))),
    };

    let id = config.id.clone();
    let result = run_blocking(move || registry.fit(&config, &x, &y)).await;
    Ok(match result {
        Ok(()) => message_response(format!("Model '{}' trained and saved", id)),
        Err(resp) => resp,
    })
}

async fn handle_load(
    body: LoadRequest,
    registry: SharedRegistry,
) -> Result<warp::reply::Response, Infallible> {
    let id = body.id.clone();
    let result = run_blocking(move || registry.load(&body.id)).await;
    Ok(match result {
        Ok(_) => message_response(format!("Model '{}' loaded", id)),
        Err(resp) => resp,
    })
}

async fn handle_predict(
    body: PredictRequest,
    registry: SharedRegistry,
) -> Result<warp::reply::Response, Infallible> {
    let id = body.id.clone();
    let result = run_blocking(move || registry.predict(&body.id, &body.x)).await;
    Ok(match result {
        Ok(predictions) => {
            let resp = PredictResponse { id, predictions };
            warp::reply::with_status(warp::reply::json(&resp), StatusCode::OK).into_response()
        }
        Err(resp) => resp,
    })
}

async fn handle_list(registry: SharedRegistry) -> Result<warp::reply::Response, Infallible> {
    // remove_all holds the registry lock while it deletes files.
    let result = run_blocking(move || Ok(registry.list_models())).await;
    Ok(match result {
        Ok(ids) => warp::reply::with_status(warp::reply::json(&ids), StatusCode::OK).into_response(),
        Err(resp) => resp,
    })
}

async fn handle_remove_all(registry: SharedRegistry) -> Result<warp::reply::Response, Infallible> {
    let result = run_blocking(move || registry.remove_all()).await;
    Ok(match result {
        Ok(_) => message_response("All models removed".to_string()),
        Err(resp) => resp,
    })
}

/// Run a registry call on the blocking pool, turning failures into responses.
async fn run_blocking<T, F>(f: F) -> Result<T, warp::reply::Response>
where
    F: FnOnce() -> Result<T, RegistryError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(registry_error_response(&e)),
        Err(e) => {
            log::error!("Registry task failed: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ))
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

fn message_response(message: String) -> warp::reply::Response {
    let body = MessageResponse { message };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::OK).into_response()
}

fn error_response(status: StatusCode, code: &str, message: &str) -> warp::reply::Response {
    let body = ApiError {
        detail: message.to_string(),
        code: code.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn registry_error_response(err: &RegistryError) -> warp::reply::Response {
    let (status, code) = match err {
        RegistryError::DuplicateId(_) => (StatusCode::BAD_REQUEST, "duplicate_id"),
        RegistryError::InvalidModelId { .. } => (StatusCode::BAD_REQUEST, "invalid_model_id"),
        RegistryError::ModelNotFound(_) => (StatusCode::NOT_FOUND, "model_not_found"),
        RegistryError::ModelNotLoaded(_) => (StatusCode::NOT_FOUND, "model_not_loaded"),
        RegistryError::Config(ConfigError::UnsupportedModelType(_)) => {
            (StatusCode::BAD_REQUEST, "unsupported_model_type")
        }
        RegistryError::Config(ConfigError::InvalidHyperparameters { .. }) => {
            (StatusCode::BAD_REQUEST, "invalid_hyperparameters")
        }
        RegistryError::Model(ModelError::InvalidInput(_)) => {
            (StatusCode::BAD_REQUEST, "invalid_input")
        }
        RegistryError::Model(ModelError::FeatureMismatch { .. }) => {
            (StatusCode::BAD_REQUEST, "feature_mismatch")
        }
        RegistryError::Model(ModelError::FitFailed(_)) => (StatusCode::BAD_REQUEST, "fit_failed"),
        RegistryError::Model(ModelError::NotFitted) | RegistryError::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    if status.is_server_error() {
        log::error!("Request failed: {}", err);
        error_response(status, code, "Internal server error")
    } else {
        log::debug!("Rejected request: {}", err);
        error_response(status, code, &err.to_string())
    }
}

/// Convert warp rejections (unknown route, bad JSON, ...) into JSON errors.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, code, message): (StatusCode, &str, String) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "Not found".into())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_request",
            format!("Invalid request body: {}", e),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "Request payload too large".into(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "length_required",
            "Content-Length header required".into(),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "Unsupported media type".into(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Method not allowed".into(),
        )
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".into(),
        )
    };

    Ok(error_response(status, code, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regserve_models::store::DEFAULT_EXTENSION;
    use regserve_models::ModelStore;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup_registry() -> (TempDir, SharedRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path(), DEFAULT_EXTENSION).unwrap();
        let registry = ModelRegistry::new(store).with_fit_delay(Duration::ZERO);
        (dir, Arc::new(registry))
    }

    fn fit_body(id: &str, kind: &str) -> serde_json::Value {
        json!({
            "X": [[1, 2], [3, 4]],
            "y": [5, 6],
            "config": {
                "id": id,
                "ml_model_type": kind,
                "hyperparameters": {"fit_intercept": true}
            }
        })
    }

    #[tokio::test]
    async fn test_fit_then_predict() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/fit")
            .json(&fit_body("linear_1", "linear"))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: MessageResponse = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.message, "Model 'linear_1' trained and saved");

        let resp = warp::test::request()
            .method("POST")
            .path("/predict")
            .json(&json!({"id": "linear_1", "X": [[5, 6], [7, 8]]}))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: PredictResponse = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.id, "linear_1");
        assert_eq!(body.predictions.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_fit() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        for expected in [StatusCode::OK, StatusCode::BAD_REQUEST] {
            let resp = warp::test::request()
                .method("POST")
                .path("/fit")
                .json(&fit_body("dup", "linear"))
                .reply(&routes)
                .await;
            assert_eq!(resp.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_duplicate_reported_before_type() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        warp::test::request()
            .method("POST")
            .path("/fit")
            .json(&fit_body("dup", "linear"))
            .reply(&routes)
            .await;
        let resp = warp::test::request()
            .method("POST")
            .path("/fit")
            .json(&fit_body("dup", "tree"))
            .reply(&routes)
            .await;
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "duplicate_id");
    }

    #[tokio::test]
    async fn test_unsupported_model_type() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/fit")
            .json(&fit_body("m", "random_forest"))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "unsupported_model_type");
        assert!(body.detail.contains("Model type not supported"));
    }

    #[tokio::test]
    async fn test_invalid_model_id() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/fit")
            .json(&fit_body("../etc/passwd", "linear"))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "invalid_model_id");
    }

    #[tokio::test]
    async fn test_predict_not_loaded() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/predict")
            .json(&PredictRequest {
                id: "ghost".into(),
                x: vec![vec![1.0]],
            })
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "model_not_loaded");
    }

    #[tokio::test]
    async fn test_load_not_found() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/load")
            .json(&LoadRequest { id: "ghost".into() })
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "model_not_found");
    }

    #[tokio::test]
    async fn test_list_and_remove_all() {
        let (dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        for id in ["a", "b"] {
            warp::test::request()
                .method("POST")
                .path("/fit")
                .json(&fit_body(id, "linear"))
                .reply(&routes)
                .await;
        }

        let resp = warp::test::request()
            .method("GET")
            .path("/list_models")
            .reply(&routes)
            .await;
        let ids: Vec<String> = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(ids, vec!["a", "b"]);

        let resp = warp::test::request()
            .method("DELETE")
            .path("/remove_all")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: MessageResponse = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.message, "All models removed");

        let resp = warp::test::request()
            .method("GET")
            .path("/list_models")
            .reply(&routes)
            .await;
        let ids: Vec<String> = serde_json::from_slice(resp.body()).unwrap();
        assert!(ids.is_empty());
        assert!(!dir.path().join("a.model").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_list_while_removing() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        for id in ["a", "b", "c"] {
            warp::test::request()
                .method("POST")
                .path("/fit")
                .json(&fit_body(id, "linear"))
                .reply(&routes)
                .await;
        }

        let list = warp::test::request()
            .method("GET")
            .path("/list_models")
            .reply(&routes);
        let remove = warp::test::request()
            .method("DELETE")
            .path("/remove_all")
            .reply(&routes);
        let (list, remove) = tokio::join!(list, remove);

        assert_eq!(remove.status(), StatusCode::OK);
        assert_eq!(list.status(), StatusCode::OK);
        let ids: Vec<String> = serde_json::from_slice(list.body()).unwrap();
        assert!(ids.is_empty() || ids == vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/fit")
            .header("content-type", "application/json")
            .body("{\"X\": [[1, 2]]")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "invalid_request");
    }

    #[tokio::test]
    async fn test_ragged_matrix() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("POST")
            .path("/fit")
            .json(&json!({
                "X": [[1, 2], [3]],
                "y": [5, 6],
                "config": {"id": "r", "ml_model_type": "linear", "hyperparameters": {}}
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body.code, "invalid_input");
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let (_dir, registry) = setup_registry();
        let routes = api_routes(registry).recover(handle_rejection);

        let resp = warp::test::request()
            .method("GET")
            .path("/nope")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = warp::test::request()
            .method("GET")
            .path("/remove_all")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
