//! Ollama-compatible embedding backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use roster_core::defaults::{EMBED_DIMENSION, EMBED_MODEL, EMBED_TIMEOUT_SECS, OLLAMA_URL};
use roster_core::{EmbeddingBackend, Error, Result, Vector};

/// Embedding backend speaking the Ollama `/api/embed` protocol.
///
/// Every returned vector is checked against the configured dimension;
/// a mismatch means the server is running a different model than the
/// similarity index was built for, and is reported as an error rather
/// than written to the database.
pub struct HttpEmbeddingBackend {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
}

impl HttpEmbeddingBackend {
    pub fn new(base_url: String, model: String, dimension: usize) -> Self {
        let timeout_secs = std::env::var("ROSTER_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(EMBED_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            model,
            dimension,
            timeout_secs,
        }
    }

    /// Create from `ROSTER_OLLAMA_URL`, `ROSTER_EMBED_MODEL`, and
    /// `ROSTER_EMBED_DIM`, with defaults when unset.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ROSTER_OLLAMA_URL").unwrap_or_else(|_| OLLAMA_URL.to_string());
        let model =
            std::env::var("ROSTER_EMBED_MODEL").unwrap_or_else(|_| EMBED_MODEL.to_string());
        let dimension = std::env::var("ROSTER_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(EMBED_DIMENSION);

        Self::new(base_url, model, dimension)
    }

    /// Check whether the embedding server is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                warn!("Embedding server health check error: {}", e);
                Ok(false)
            }
        }
    }
}

impl Default for HttpEmbeddingBackend {
    fn default() -> Self {
        Self::from_env()
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Collaborator(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Collaborator(format!(
                "Embedding server returned {}: {}",
                status, body
            )));
        }

        let result: EmbedResponse = response.json().await.map_err(|e| {
            Error::Collaborator(format!("Failed to parse embedding response: {}", e))
        })?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Collaborator(format!(
                "Embedding server returned {} vectors for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        for embedding in &result.embeddings {
            if embedding.len() != self.dimension {
                return Err(Error::Collaborator(format!(
                    "Embedding server returned {}-dimensional vector, expected {}",
                    embedding.len(),
                    self.dimension
                )));
            }
        }

        debug!(
            model = %self.model,
            count = result.embeddings.len(),
            "Embedding complete"
        );

        Ok(result.embeddings.into_iter().map(Vector::from).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
