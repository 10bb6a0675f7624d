//! OpenAI embeddings adapter.

use std::sync::Arc;

use async_trait::async_trait;
use oidm_search::{Embedder, Embedding, SearchError};
use serde::Deserialize;

use crate::config::OpenAiConfig;

use super::{describe_http_error, endpoint};

/// Build the JSON request body for `/v1/embeddings`.
///
/// Newlines in `text` are replaced by spaces.
pub fn build_embeddings_request(model: &str, text: &str, dimensions: usize) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "input": [text.replace('\n', " ")],
        "dimensions": dimensions,
    })
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// An [`Embedder`] backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OpenAiEmbedder {
    pub fn new(client: reqwest::Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            url: endpoint(&config.base_url, "/v1/embeddings"),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
        let body = build_embeddings_request(&self.model, text, self.dimensions);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Embedding(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SearchError::Embedding(describe_http_error(status, &body_text)));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Embedding(format!("OpenAI response unreadable: {e}")))?;

        let Some(first) = parsed.data.into_iter().next() else {
            return Err(SearchError::Embedding("OpenAI returned no embedding".into()));
        };
        if first.embedding.len() != self.dimensions {
            return Err(SearchError::Embedding(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                first.embedding.len()
            )));
        }

        tracing::trace!(model = %self.model, "query embedded");
        Ok(Arc::new(first.embedding))
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }
}
