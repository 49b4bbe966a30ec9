//! Upstash Vector REST client
//!
//! The index is created with a built-in embedding model, so records are sent
//! as raw text (`/upsert-data`, `/query-data`).

use super::{map_http_error, StoredVector, VectorHit, VectorIndex, VectorRecord};
use crate::error::{Result, TwinError};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

const UPSERT_BATCH_SIZE: usize = 100;
const RANGE_PAGE_SIZE: usize = 100;

pub struct UpstashVectorIndex {
    http: Client,
    base_url: String,
    token: SecretString,
    timeout: Duration,
}

impl UpstashVectorIndex {
    /// Create a client; fails fast when url or token is missing
    pub fn new(url: Option<&str>, token: Option<&SecretString>, timeout: Duration) -> Result<Self> {
        let base_url = url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TwinError::Configuration("UPSTASH_VECTOR_REST_URL is not set".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let token = token
            .filter(|t| !t.expose_secret().is_empty())
            .map(|t| SecretString::new(t.expose_secret().clone()))
            .ok_or_else(|| TwinError::Configuration("UPSTASH_VECTOR_REST_TOKEN is not set".to_string()))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TwinError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token,
            timeout,
        })
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);

        let req = match body {
            Some(body) => self.http.post(&url).json(&body),
            None => self.http.get(&url),
        };

        let response = req
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| map_http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TwinError::Retrieval(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| TwinError::Retrieval(format!("Invalid response from {}: {}", path, e)))?;

        match (envelope.result, envelope.error) {
            (_, Some(error)) => Err(TwinError::Retrieval(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(TwinError::Retrieval(format!("Empty response from {}", path))),
        }
    }
}

#[async_trait]
impl VectorIndex for UpstashVectorIndex {
    fn name(&self) -> &'static str {
        "upstash"
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        for (batch_no, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let body: Vec<Value> = batch
                .iter()
                .map(|r| json!({ "id": r.id, "data": r.text, "metadata": r.metadata }))
                .collect();

            let _: Value = self.call("upsert-data", Some(Value::Array(body))).await?;
            info!("Uploaded batch {} ({} vectors)", batch_no + 1, batch.len());
        }
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>> {
        debug!("Querying Upstash: top_k={}", top_k);

        let body = json!({
            "data": text,
            "topK": top_k,
            "includeMetadata": true,
        });
        let raw: Vec<RawHit> = self.call("query-data", Some(body)).await?;

        Ok(raw
            .into_iter()
            .map(|hit| VectorHit {
                id: id_to_string(&hit.id),
                score: hit.score,
                metadata: hit.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn fetch_all(&self) -> Result<Vec<StoredVector>> {
        let mut cursor = "0".to_string();
        let mut entries = Vec::new();

        loop {
            let body = json!({
                "cursor": cursor,
                "limit": RANGE_PAGE_SIZE,
                "includeMetadata": true,
            });
            let page: RangePage = self.call("range", Some(body)).await?;

            entries.extend(page.vectors.into_iter().map(|v| StoredVector {
                id: id_to_string(&v.id),
                metadata: v.metadata.unwrap_or_default(),
            }));

            if page.next_cursor.is_empty() {
                break;
            }
            cursor = page.next_cursor;
        }

        Ok(entries)
    }

    async fn count(&self) -> Result<usize> {
        let info: IndexInfo = self.call("info", None).await?;
        Ok(info.vector_count)
    }
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct RawHit {
    id: Value,
    score: f32,
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawVector {
    id: Value,
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangePage {
    #[serde(default)]
    next_cursor: String,
    #[serde(default)]
    vectors: Vec<RawVector>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexInfo {
    vector_count: usize,
}
