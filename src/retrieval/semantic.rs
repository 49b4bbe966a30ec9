//! Nearest-neighbor retrieval through a vector index

use super::{ensure_top_k, rank, RetrievalResult, Retriever};
use crate::error::{Result, TwinError};
use crate::facts::FactChunk;
use crate::vector::VectorIndex;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct SemanticRetriever {
    index: Option<Arc<dyn VectorIndex>>,
}

impl SemanticRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index: Some(index) }
    }

    /// Retriever for an index that never initialized; every search fails
    pub fn unavailable() -> Self {
        Self { index: None }
    }
}

#[async_trait]
impl Retriever for SemanticRetriever {
    fn backend(&self) -> &'static str {
        "semantic"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        ensure_top_k(top_k)?;
        let index = self.index.as_ref().ok_or_else(|| {
            TwinError::RetrieverUnavailable("Vector database not initialized".to_string())
        })?;

        let hits = index.query(query, top_k).await?;
        debug!("{} returned {} hits", index.name(), hits.len());

        let results = hits
            .into_iter()
            .map(|hit| RetrievalResult {
                chunk: FactChunk::from_metadata(hit.id, &hit.metadata),
                score: hit.score,
            })
            .collect();

        Ok(rank(results, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FactStore, VectorFactStore};
    use crate::testing::FakeVectorIndex;

    async fn seeded() -> Arc<FakeVectorIndex> {
        let index = Arc::new(FakeVectorIndex::default());
        let store = VectorFactStore::new(index.clone());
        store
            .put_many(&[
                FactChunk::new("c1", "Skills", "Python and distributed systems").with_kind("skill"),
                FactChunk::new("c2", "Education", "Computer science degree"),
                FactChunk::new("c3", "Projects", "Distributed systems tooling in Python"),
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_results_bounded_and_sorted() {
        let retriever = SemanticRetriever::new(seeded().await);

        let results = retriever.search("python distributed systems", 2).await.unwrap();
        assert!(results.len() <= 2);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_metadata_carried_through() {
        let retriever = SemanticRetriever::new(seeded().await);

        let results = retriever.search("skills", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.title, "Skills");
        assert_eq!(results[0].chunk.kind, "skill");
        assert_eq!(results[0].chunk.content, "Python and distributed systems");
    }

    #[tokio::test]
    async fn test_uninitialized_index() {
        let err = SemanticRetriever::unavailable().search("skills", 3).await.unwrap_err();
        assert!(matches!(err, TwinError::RetrieverUnavailable(_)));
    }

    #[tokio::test]
    async fn test_index_failure_propagates() {
        let index = Arc::new(FakeVectorIndex::failing("connection reset"));
        let err = SemanticRetriever::new(index).search("skills", 3).await.unwrap_err();
        assert!(matches!(err, TwinError::Retrieval(ref m) if m.contains("connection reset")));
    }
}
