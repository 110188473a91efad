//! Client for the external embedding service
//!
//! The bridge never computes embeddings itself; it calls an OpenAI-compatible
//! `/embeddings` endpoint and forwards the resulting fixed-length vector to
//! the store. Used only by the direct backend variant.

use crate::error::{BridgeError, Result};
use crate::types::EmbeddingConfig;

/// Embedding service client (OpenAI-compatible API)
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Number of dimensions every vector from this client must have
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Turn a piece of text into an embedding vector
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&serde_json::json!({
                "input": text,
                "model": self.config.model,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Upstream(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let data: serde_json::Value = response.json().await?;
        let embedding: Vec<f32> = data["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| BridgeError::Parse("Invalid embedding response format".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if embedding.len() != self.config.dimensions {
            return Err(BridgeError::Upstream(format!(
                "Embedding dimensions mismatch: expected {}, got {}",
                self.config.dimensions,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}
