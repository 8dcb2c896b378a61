//! HTTP client for a running regserve server.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::{
    ApiError, FitRequest, LoadRequest, MessageResponse, PredictRequest, PredictResponse,
};
use regserve_models::ModelSpec;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Cannot reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl ClientError {
    /// The server's error code, when the failure came back as an API error body.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Async client for the `/fit`, `/load`, `/predict`, `/list_models` and
/// `/remove_all` endpoints.
#[derive(Clone, Debug)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    /// No overall timeout is set: a fit blocks for the server's fit delay.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fit(
        &self,
        id: &str,
        ml_model_type: &str,
        hyperparameters: Map<String, Value>,
        x: Vec<Vec<f64>>,
        y: Vec<f64>,
    ) -> Result<String, ClientError> {
        let body = FitRequest {
            x,
            y,
            config: ModelSpec {
                id: id.to_string(),
                ml_model_type: ml_model_type.to_string(),
                hyperparameters,
            },
        };
        let resp: MessageResponse = self.send(Method::POST, "fit", Some(&body)).await?;
        Ok(resp.message)
    }

    pub async fn load(&self, id: &str) -> Result<String, ClientError> {
        let body = LoadRequest { id: id.to_string() };
        let resp: MessageResponse = self.send(Method::POST, "load", Some(&body)).await?;
        Ok(resp.message)
    }

    pub async fn predict(&self, id: &str, x: Vec<Vec<f64>>) -> Result<Vec<f64>, ClientError> {
        let body = PredictRequest { id: id.to_string(), x };
        let resp: PredictResponse = self.send(Method::POST, "predict", Some(&body)).await?;
        Ok(resp.predictions)
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        self.send::<(), _>(Method::GET, "list_models", None).await
    }

    pub async fn remove_all(&self) -> Result<String, ClientError> {
        let resp: MessageResponse = self
            .send::<(), _>(Method::DELETE, "remove_all", None)
            .await?;
        Ok(resp.message)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|source| ClientError::Unreachable {
            url: url.clone(),
            source,
        })?;
        Self::check_response(resp).await
    }

    async fn check_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let text = resp.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiError>(&text) {
            Ok(err) => ClientError::Api {
                status: status.as_u16(),
                code: Some(err.code),
                message: err.detail,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: None,
                message: if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                } else {
                    text
                },
            },
        })
    }
}

/// True when `err` is an API error carrying `status`.
pub fn is_status(err: &ClientError, status: StatusCode) -> bool {
    matches!(err, ClientError::Api { status: s, .. } if *s == status.as_u16())
}
