
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{ConfigError, OllamaConfig};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const CONNECTION_PROBE: &str = "test connection";

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding text cannot be empty")]
    EmptyText,
    #[error("embedding request failed: {0}")]
    Transport(#[from] Box<ureq::Error>),
    #[error("embedding API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed embedding payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("received empty embedding from API")]
    EmptyEmbedding,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    endpoint: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self, ConfigError> {
        let base_url = config.ollama_url()?;
        let endpoint = base_url
            .join("/api/embeddings")
            .map_err(|_| ConfigError::InvalidUrl(base_url.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            base_url,
            endpoint,
            model: config.model.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an embedding for a single text.
    ///
    /// Each call is one independent request: no retries, no caching. Callers
    /// absorb failures.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };
        let request_json = serde_json::to_string(&request)?;

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(Box::new)?;

        let status = response.status();
        let body = response.body_mut().read_to_string().map_err(Box::new)?;

        if !status.is_success() {
            // Prefer the provider's structured error message, fall back to the
            // raw body.
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .map(|e| e.error)
                .filter(|e| !e.is_empty())
                .unwrap_or(body);
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbedResponse = serde_json::from_str(&body)?;
        if parsed.embedding.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }

        debug!("Generated embedding with {} dimensions", parsed.embedding.len());
        Ok(parsed.embedding)
    }

    /// Verify connectivity to the embedding provider with a fixed probe
    /// phrase. Performs exactly one embed call and discards the vector.
    #[inline]
    pub fn test_connection(&self) -> Result<(), EmbeddingError> {
        debug!("Testing embedding provider at {}", self.base_url);
        self.embed(CONNECTION_PROBE).map(|_| ())
    }
}
