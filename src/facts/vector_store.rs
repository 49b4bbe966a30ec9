//! Fact store realized on a semantic vector index

use super::models::FactChunk;
use super::store::FactStore;
use crate::error::Result;
use crate::vector::{VectorIndex, VectorRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Chunks embedded from `title: content` at upsert time
///
/// The index has no sentinel key; a non-empty index counts as initialized.
pub struct VectorFactStore {
    index: Arc<dyn VectorIndex>,
}

impl VectorFactStore {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    fn record(chunk: &FactChunk) -> VectorRecord {
        VectorRecord {
            id: chunk.id.clone(),
            text: chunk.embedding_text(),
            metadata: chunk.metadata(),
        }
    }
}

#[async_trait]
impl FactStore for VectorFactStore {
    fn backend(&self) -> &'static str {
        self.index.name()
    }

    async fn put(&self, chunk: &FactChunk) -> Result<()> {
        self.index.upsert(vec![Self::record(chunk)]).await
    }

    async fn put_many(&self, chunks: &[FactChunk]) -> Result<()> {
        self.index
            .upsert(chunks.iter().map(Self::record).collect())
            .await
    }

    async fn all(&self) -> Result<Vec<FactChunk>> {
        Ok(self
            .index
            .fetch_all()
            .await?
            .into_iter()
            .map(|v| FactChunk::from_metadata(v.id, &v.metadata))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.index.count().await
    }

    async fn is_initialized(&self) -> Result<bool> {
        Ok(self.index.count().await? > 0)
    }

    async fn mark_initialized(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> bool {
        match self.index.count().await {
            Ok(_) => true,
            Err(e) => {
                warn!("{} index ping failed: {}", self.index.name(), e);
                false
            }
        }
    }
}
