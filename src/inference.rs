use std::time::Duration;

use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::warn;

use crate::error::ApiError;

/// Timeout for health and model-info calls; predictions use the configured one.
const INFO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference service unreachable")]
    Unavailable,
    #[error("inference request timed out")]
    Timeout,
    #[error("inference request failed with status {status}")]
    Failed { status: u16 },
    #[error("model '{0}' not found")]
    UnknownModel(String),
    #[error("invalid inference response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout
        } else if err.is_connect() {
            InferenceError::Unavailable
        } else if let Some(status) = err.status() {
            InferenceError::Failed {
                status: status.as_u16(),
            }
        } else {
            InferenceError::Unavailable
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Unavailable => ApiError::UpstreamUnavailable("inference"),
            InferenceError::Timeout => ApiError::UpstreamTimeout("inference"),
            InferenceError::Failed { status } => ApiError::UpstreamFailure {
                service: "inference",
                status: Some(status),
            },
            InferenceError::UnknownModel(name) => ApiError::NotFound(format!("model '{}'", name)),
            InferenceError::BadResponse(_) => ApiError::UpstreamFailure {
                service: "inference",
                status: None,
            },
        }
    }
}

/// HTTP client for the ML inference service.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Liveness probe. Any network error or non-2xx reads as "down"; never errors.
    #[tracing::instrument(skip(self))]
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(INFO_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "inference health check failed");
                false
            }
        }
    }

    /// Run a prediction against the named model. The response body is kept
    /// opaque; its shape belongs to the inference service.
    #[tracing::instrument(skip(self, body), fields(size = body.len()))]
    pub async fn predict(
        &self,
        body: &[u8],
        filename: &str,
        content_type: &str,
        model_name: &str,
    ) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/predict", self.base_url);
        let form = Form::new().part("file", file_part(body, filename, content_type));

        let resp = self
            .http
            .post(&url)
            .query(&[("model_name", model_name)])
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), detail = %detail.chars().take(200).collect::<String>(), "predict failed");
            return Err(InferenceError::Failed {
                status: status.as_u16(),
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| InferenceError::BadResponse(e.to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_models(&self) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/models", self.base_url);
        let resp = self.http.get(&url).timeout(INFO_TIMEOUT).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(InferenceError::Failed {
                status: status.as_u16(),
            });
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| InferenceError::BadResponse(e.to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn model_info(&self, name: &str) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/models/{}", self.base_url, name);
        let resp = self.http.get(&url).timeout(INFO_TIMEOUT).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(InferenceError::UnknownModel(name.to_string()));
        }
        if !status.is_success() {
            return Err(InferenceError::Failed {
                status: status.as_u16(),
            });
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| InferenceError::BadResponse(e.to_string()))
    }
}

fn file_part(body: &[u8], filename: &str, content_type: &str) -> Part {
    let part = Part::bytes(body.to_vec()).file_name(filename.to_string());
    match part.mime_str(content_type) {
        Ok(p) => p,
        // Unparseable content type from the caller; ship the bytes anyway.
        Err(_) => Part::bytes(body.to_vec()).file_name(filename.to_string()),
    }
}
