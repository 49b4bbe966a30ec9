//! Retrieval of relevant profile facts for a question
//!
//! `Retriever` is the seam the query pipeline depends on. The concrete
//! strategy is chosen once at startup from whichever backend came up.

pub mod keyword;
pub mod semantic;

pub use keyword::KeywordRetriever;
pub use semantic::SemanticRetriever;

use crate::error::{Result, TwinError};
use crate::facts::FactChunk;
use async_trait::async_trait;
use std::cmp::Ordering;

/// One retrieval hit
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: FactChunk,
    /// Backend-dependent: similarity for semantic search, 1.0 for a keyword match
    pub score: f32,
}

/// Maps a question to ranked facts
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Backend label for logs and metrics
    fn backend(&self) -> &'static str;

    /// At most `top_k` results, sorted by descending score
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>>;
}

pub(crate) fn ensure_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(TwinError::InvalidRequest("top_k must be at least 1".to_string()));
    }
    Ok(())
}

/// Stable descending sort, then cap at `top_k`
pub(crate) fn rank(mut results: Vec<RetrievalResult>, top_k: usize) -> Vec<RetrievalResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(top_k);
    results
}
