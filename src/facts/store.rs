//! Fact store contract, in-process realization and the one-time profile load

use super::models::FactChunk;
use crate::error::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

/// Holder of profile facts
///
/// Written only during the startup load, read-only while serving.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Short backend name used in health payloads and metrics
    fn backend(&self) -> &'static str;

    /// Idempotent upsert keyed by chunk id
    async fn put(&self, chunk: &FactChunk) -> Result<()>;

    /// Bulk upsert; backends with batch endpoints override this
    async fn put_many(&self, chunks: &[FactChunk]) -> Result<()> {
        for chunk in chunks {
            debug!("Storing chunk: id={}", chunk.id);
            self.put(chunk).await?;
        }
        Ok(())
    }

    /// Every stored chunk, in store iteration order
    async fn all(&self) -> Result<Vec<FactChunk>>;

    async fn count(&self) -> Result<usize>;

    async fn is_initialized(&self) -> Result<bool>;

    async fn mark_initialized(&self) -> Result<()>;

    /// Live reachability check
    async fn ping(&self) -> bool {
        true
    }
}

/// Outcome of a profile load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    AlreadyInitialized,
}

/// Load chunks into a store unless its sentinel says it is already initialized
pub async fn load_profile(store: &dyn FactStore, chunks: &[FactChunk]) -> Result<LoadOutcome> {
    if store.is_initialized().await? {
        info!("{} store already initialized with profile data", store.backend());
        return Ok(LoadOutcome::AlreadyInitialized);
    }

    info!("Loading {} profile chunks into {} store", chunks.len(), store.backend());
    store.put_many(chunks).await?;
    store.mark_initialized().await?;
    info!("Loaded {} chunks into {} store", chunks.len(), store.backend());

    Ok(LoadOutcome::Loaded(chunks.len()))
}

/// In-process key-value store, preserving insertion order
#[derive(Default)]
pub struct MemoryFactStore {
    chunks: RwLock<IndexMap<String, FactChunk>>,
    initialized: AtomicBool,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an initialized store from chunks
    pub fn with_chunks(chunks: impl IntoIterator<Item = FactChunk>) -> Self {
        let map = chunks.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            chunks: RwLock::new(map),
            initialized: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl FactStore for MemoryFactStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, chunk: &FactChunk) -> Result<()> {
        let mut chunks = self.chunks.write().unwrap_or_else(|e| e.into_inner());
        chunks.insert(chunk.id.clone(), chunk.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<FactChunk>> {
        let chunks = self.chunks.read().unwrap_or_else(|e| e.into_inner());
        Ok(chunks.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        let chunks = self.chunks.read().unwrap_or_else(|e| e.into_inner());
        Ok(chunks.len())
    }

    async fn is_initialized(&self) -> Result<bool> {
        Ok(self.initialized.load(Ordering::Acquire))
    }

    async fn mark_initialized(&self) -> Result<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }
}
