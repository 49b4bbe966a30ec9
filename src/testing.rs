//! In-process fakes for the backend capabilities
//!
//! Used by unit and router tests in place of live indexes and model providers.

use crate::error::{Result, TwinError};
use crate::generation::{CompletionRequest, TextGenerator};
use crate::retrieval::{RetrievalResult, Retriever};
use crate::vector::{StoredVector, VectorHit, VectorIndex, VectorRecord};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Vector index scoring by query-token overlap, in [0, 1]
#[derive(Default)]
pub struct FakeVectorIndex {
    records: Mutex<IndexMap<String, VectorRecord>>,
    failure: Option<String>,
}

impl FakeVectorIndex {
    /// Index whose every call fails with a retrieval error
    pub fn failing(message: &str) -> Self {
        Self {
            records: Mutex::default(),
            failure: Some(message.to_string()),
        }
    }

    /// Embedded texts, in upsert order
    pub fn texts(&self) -> Vec<String> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.values().map(|r| r.text.clone()).collect()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(TwinError::Retrieval(message.clone())),
            None => Ok(()),
        }
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl VectorIndex for FakeVectorIndex {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn upsert(&self, batch: Vec<VectorRecord>) -> Result<()> {
        self.check()?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        for record in batch {
            records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>> {
        self.check()?;
        let query = tokens(text);
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        let mut hits: Vec<VectorHit> = records
            .values()
            .map(|record| {
                let words = tokens(&record.text);
                let matched = query.iter().filter(|q| words.contains(q)).count();
                let score = if query.is_empty() {
                    0.0
                } else {
                    matched as f32 / query.len() as f32
                };
                VectorHit {
                    id: record.id.clone(),
                    score,
                    metadata: record.metadata.clone(),
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn fetch_all(&self) -> Result<Vec<StoredVector>> {
        self.check()?;
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .map(|r| StoredVector {
                id: r.id.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.check()?;
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).len())
    }
}

/// Generator returning a fixed reply and recording requests
pub struct FakeGenerator {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last: Mutex<Option<CompletionRequest>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// Generator whose every call fails with a generation error
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply.clone().map_err(TwinError::Generation)
    }
}

/// Retriever returning scripted results
pub struct FakeRetriever {
    results: std::result::Result<Vec<RetrievalResult>, String>,
    delay: Option<Duration>,
}

impl FakeRetriever {
    pub fn returning(results: Vec<RetrievalResult>) -> Self {
        Self {
            results: Ok(results),
            delay: None,
        }
    }

    /// Retriever whose every search fails with a retrieval error
    pub fn failing(message: &str) -> Self {
        Self {
            results: Err(message.to_string()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    fn backend(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut results = self.results.clone().map_err(TwinError::Retrieval)?;
        results.truncate(top_k);
        Ok(results)
    }
}
