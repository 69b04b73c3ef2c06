//! Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
//!
//! Each call is a single HTTP request; batching, retries and deadlines are
//! layered on top by [`super::BatchEmbedder`].
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Embedder;
use crate::config::{ApiKey, EmbeddingConfig};
use crate::error::ProviderError;

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
    model: String,
    dimensions: Option<usize>,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Build an embedder from config, reading the API key from the environment.
    pub fn from_config(config: &EmbeddingConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let api_key = ApiKey::from_env(&config.api_key_env)?;
        Self::new(config, api_key, timeout)
    }

    pub fn new(
        config: &EmbeddingConfig,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
            timeout,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Requesting {} embeddings from {}", texts.len(), self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
                dimensions: self.dimensions,
            })
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        // Rows may arrive in any order; `index` ties each back to its input.
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for row in parsed.data {
            let slot = slots.get_mut(row.index).ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "embedding index {} out of range for {} inputs",
                    row.index,
                    texts.len()
                ))
            })?;
            *slot = Some(row.embedding);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    ProviderError::InvalidResponse(format!("missing embedding for input {i}"))
                })
            })
            .collect()
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}
