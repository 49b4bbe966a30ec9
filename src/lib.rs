//! Digital twin question answering
//!
//! Answers natural-language questions about one person from a profile of
//! facts: retrieve relevant facts, compose a grounded prompt, generate an
//! answer with a hosted language model. Served over a JSON HTTP surface and a
//! JSON-RPC command surface for editor integrations.

pub mod api;
pub mod config;
pub mod embedding;
pub mod error;
pub mod facts;
pub mod generation;
pub mod metrics;
pub mod pipeline;
pub mod retrieval;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vector;

pub use config::Config;
pub use error::{Result, TwinError};
pub use facts::{FactChunk, FactStore};
pub use pipeline::{QueryPipeline, QueryRequest, QueryResponse, Source};
pub use retrieval::{RetrievalResult, Retriever};
