//! Qdrant-backed vector index

use super::{StoredVector, VectorHit, VectorIndex, VectorRecord};
use crate::embedding::Embedder;
use crate::error::{Result, TwinError};
use async_trait::async_trait;
use qdrant_client::{
    client::{QdrantClient, QdrantClientConfig},
    prelude::Payload,
    qdrant::{
        value::Kind, CountPoints, CreateCollection, Distance, PointStruct, ScrollPoints,
        SearchPoints, Value as QValue, VectorParams, VectorsConfig,
    },
};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Payload key holding the original chunk id (point ids must be UUIDs)
const CHUNK_ID_KEY: &str = "chunk_id";
const SCROLL_PAGE_SIZE: u32 = 256;

/// Qdrant index configuration
#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_name: String,
    pub vector_size: u64,
    /// Upper bound on the startup handshake
    pub connect_timeout: Duration,
}

pub struct QdrantVectorIndex {
    client: QdrantClient,
    config: QdrantIndexConfig,
    embedder: Arc<dyn Embedder>,
}

impl QdrantVectorIndex {
    /// Connect and make sure the collection exists
    pub async fn connect(config: QdrantIndexConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut client_config = QdrantClientConfig::from_url(&config.url);
        client_config.api_key = config.api_key.clone();

        let client = client_config
            .build()
            .map_err(|e| TwinError::Configuration(format!("Invalid Qdrant configuration: {}", e)))?;

        let connect_timeout = config.connect_timeout;
        let index = Self {
            client,
            config,
            embedder,
        };

        tokio::time::timeout(connect_timeout, index.ensure_collection())
            .await
            .map_err(|_| {
                TwinError::StoreUnavailable(format!(
                    "Qdrant did not answer within {:?}",
                    connect_timeout
                ))
            })??;
        Ok(index)
    }

    /// Ensure the profile collection exists
    async fn ensure_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| TwinError::StoreUnavailable(format!("Failed to list collections: {}", e)))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.config.collection_name);

        if !exists {
            info!("Creating profile collection: {}", self.config.collection_name);

            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.config.collection_name.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(qdrant_client::qdrant::vectors_config::Config::Params(
                            VectorParams {
                                size: self.config.vector_size,
                                distance: Distance::Cosine.into(),
                                ..Default::default()
                            },
                        )),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| TwinError::StoreUnavailable(format!("Failed to create collection: {}", e)))?;
        }

        Ok(())
    }

    /// Deterministic point id so re-upserting a chunk overwrites it
    fn point_id(chunk_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut points = Vec::with_capacity(records.len());
        for (record, vector) in records.into_iter().zip(vectors) {
            let mut metadata = record.metadata;
            metadata.insert(CHUNK_ID_KEY.to_string(), Value::String(record.id.clone()));

            let payload = Payload::try_from(Value::Object(metadata))
                .map_err(|e| TwinError::Internal(format!("Failed to build payload: {}", e)))?;

            points.push(PointStruct::new(Self::point_id(&record.id), vector, payload));
        }

        let count = points.len();
        self.client
            .upsert_points_blocking(&self.config.collection_name, None, points, None)
            .await
            .map_err(|e| TwinError::Retrieval(format!("Failed to upsert points: {}", e)))?;

        info!("Upserted {} points into {}", count, self.config.collection_name);
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>> {
        let vector = self.embedder.embed_query(text).await?;

        debug!("Searching {}: top_k={}", self.config.collection_name, top_k);

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.config.collection_name.clone(),
                vector,
                limit: top_k as u64,
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| TwinError::Retrieval(format!("Failed to search points: {}", e)))?;

        Ok(search_result
            .result
            .into_iter()
            .map(|point| {
                let (id, metadata) = split_payload(point.payload);
                VectorHit {
                    id,
                    score: point.score,
                    metadata,
                }
            })
            .collect())
    }

    async fn fetch_all(&self) -> Result<Vec<StoredVector>> {
        let mut entries = Vec::new();
        let mut offset = None;

        loop {
            let page = self
                .client
                .scroll(&ScrollPoints {
                    collection_name: self.config.collection_name.clone(),
                    offset: offset.take(),
                    limit: Some(SCROLL_PAGE_SIZE),
                    with_payload: Some(true.into()),
                    ..Default::default()
                })
                .await
                .map_err(|e| TwinError::Retrieval(format!("Failed to scroll points: {}", e)))?;

            entries.extend(page.result.into_iter().map(|point| {
                let (id, metadata) = split_payload(point.payload);
                StoredVector { id, metadata }
            }));

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(&CountPoints {
                collection_name: self.config.collection_name.clone(),
                exact: Some(true),
                ..Default::default()
            })
            .await
            .map_err(|e| TwinError::Retrieval(format!("Failed to count points: {}", e)))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

/// Separate the chunk id from the rest of a point payload
fn split_payload(payload: HashMap<String, QValue>) -> (String, Map<String, Value>) {
    let mut metadata: Map<String, Value> = payload
        .into_iter()
        .map(|(k, v)| (k, to_json(v)))
        .collect();

    let id = match metadata.remove(CHUNK_ID_KEY) {
        Some(Value::String(id)) => id,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    (id, metadata)
}

fn to_json(value: QValue) -> Value {
    match value.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => {
            Value::Object(s.fields.into_iter().map(|(k, v)| (k, to_json(v))).collect())
        }
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}
