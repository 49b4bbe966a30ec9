//! Semantic vector index capability
//!
//! The service only invokes an index, it never builds one:
//! - `UpstashVectorIndex` embeds text server-side over REST
//! - `QdrantVectorIndex` embeds through an `Embedder` and stores in Qdrant

pub mod qdrant;
pub mod upstash;

pub use qdrant::{QdrantIndexConfig, QdrantVectorIndex};
pub use upstash::UpstashVectorIndex;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Text plus metadata to upsert
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// One nearest-neighbor hit
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    /// Similarity, higher is better
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Stored entry returned by a full listing
#[derive(Debug, Clone)]
pub struct StoredVector {
    pub id: String,
    pub metadata: Map<String, Value>,
}

/// Semantic nearest-neighbor search over text
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Provider name for logs and health payloads
    fn name(&self) -> &'static str;

    /// Embed and upsert records; ids are stable so repeats overwrite
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Up to `top_k` hits ordered by descending similarity
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>>;

    /// Every stored entry with its metadata
    async fn fetch_all(&self) -> Result<Vec<StoredVector>>;

    /// Number of stored vectors
    async fn count(&self) -> Result<usize>;
}

/// Shared response check for index HTTP APIs
pub(crate) fn map_http_error(e: reqwest::Error, timeout: std::time::Duration) -> crate::error::TwinError {
    use crate::error::TwinError;

    if e.is_timeout() {
        TwinError::Timeout(timeout, "vector index")
    } else if e.is_connect() {
        TwinError::StoreUnavailable(e.to_string())
    } else {
        TwinError::Retrieval(e.to_string())
    }
}
