//! Profile fact storage
//!
//! Two realizations share the `FactStore` contract:
//! - key-value (`RedisFactStore`, `MemoryFactStore`) with an initialization sentinel
//! - vector index (`VectorFactStore`) embedding `title: content` per chunk

pub mod models;
pub mod redis_store;
pub mod store;
pub mod vector_store;

pub use models::{FactChunk, ProfileData};
pub use redis_store::RedisFactStore;
pub use store::{load_profile, FactStore, LoadOutcome, MemoryFactStore};
pub use vector_store::VectorFactStore;
