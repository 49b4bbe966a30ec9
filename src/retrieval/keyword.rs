//! Substring retrieval over the key-value store
//!
//! Linear scan, case-insensitive exact substring of `title content`.
//! Every match scores 1.0, so ordering is store iteration order.

use super::{ensure_top_k, RetrievalResult, Retriever};
use crate::error::{Result, TwinError};
use crate::facts::{FactChunk, FactStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const MATCH_SCORE: f32 = 1.0;

pub struct KeywordRetriever {
    store: Option<Arc<dyn FactStore>>,
}

impl KeywordRetriever {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Retriever for a store that never connected; every search fails
    pub fn unavailable() -> Self {
        Self { store: None }
    }

    fn matches(chunk: &FactChunk, needle: &str) -> bool {
        format!("{} {}", chunk.title, chunk.content)
            .to_lowercase()
            .contains(needle)
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn backend(&self) -> &'static str {
        "keyword"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        ensure_top_k(top_k)?;
        let store = self.store.as_ref().ok_or_else(|| {
            TwinError::StoreUnavailable("Key-value store not initialized".to_string())
        })?;

        let needle = query.to_lowercase();
        let chunks = store.all().await?;
        let scanned = chunks.len();

        let results: Vec<RetrievalResult> = chunks
            .into_iter()
            .filter(|chunk| Self::matches(chunk, &needle))
            .take(top_k)
            .map(|chunk| RetrievalResult {
                chunk,
                score: MATCH_SCORE,
            })
            .collect();

        debug!("Keyword scan: {} chunks, {} kept", scanned, results.len());
        Ok(results)
    }
}
