//! Text embedding client for indexes that do not embed server-side

use crate::error::{Result, TwinError};
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Text to vector embedding
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch, preserving input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| TwinError::Retrieval("Embedding service returned no vectors".to_string()))
    }
}

/// OpenAI-compatible `/embeddings` client with a query cache
pub struct HttpEmbedder {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
    query_cache: Cache<String, Arc<Vec<f32>>>,
}

impl HttpEmbedder {
    pub fn new(
        api_url: &str,
        api_key: Option<&SecretString>,
        model: &str,
        cache_size: u64,
        timeout: Duration,
    ) -> Result<Self> {
        if api_url.is_empty() {
            return Err(TwinError::Configuration("embedding.api_url is not set".to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TwinError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", api_url.trim_end_matches('/')),
            api_key: api_key.map(|k| SecretString::new(k.expose_secret().clone())),
            model: model.to_string(),
            timeout,
            query_cache: Cache::new(cache_size),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut req = self.http.post(&self.endpoint).json(&request);
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let response = req
            .send()
            .await
            .map_err(|e| crate::vector::map_http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwinError::Retrieval(format!(
                "Embedding HTTP {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TwinError::Retrieval(format!("Failed to parse embeddings: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(TwinError::Retrieval(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.query_cache.get(text).await {
            return Ok(hit.as_ref().clone());
        }

        let vector = self
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| TwinError::Retrieval("Embedding service returned no vectors".to_string()))?;

        self.query_cache
            .insert(text.to_string(), Arc::new(vector.clone()))
            .await;
        Ok(vector)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
