//! Key-value fact store backed by Redis
//!
//! Layout under the configured namespace:
//! - `{ns}:chunks` hash, field = chunk id, value = JSON field map
//! - `{ns}:initialized` sentinel written after a complete load

use super::models::FactChunk;
use super::store::FactStore;
use crate::error::{Result, TwinError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

pub struct RedisFactStore {
    conn: ConnectionManager,
    chunks_key: String,
    initialized_key: String,
}

impl RedisFactStore {
    /// Connect and verify the server answers PING within `timeout`
    pub async fn connect(url: &str, namespace: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| TwinError::Configuration(format!("Invalid Redis URL: {}", e)))?;

        let (conn, pong) = tokio::time::timeout(timeout, Self::handshake(client))
            .await
            .map_err(|_| {
                TwinError::StoreUnavailable(format!("Redis did not answer within {:?}", timeout))
            })??;
        if pong != "PONG" {
            return Err(TwinError::StoreUnavailable(format!(
                "Unexpected PING reply: {}",
                pong
            )));
        }

        info!("Connected to Redis, namespace={}", namespace);

        Ok(Self {
            conn,
            chunks_key: format!("{}:chunks", namespace),
            initialized_key: format!("{}:initialized", namespace),
        })
    }

    async fn handshake(client: redis::Client) -> Result<(ConnectionManager, String)> {
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| TwinError::StoreUnavailable(format!("Failed to connect to Redis: {}", e)))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| TwinError::StoreUnavailable(format!("Redis PING failed: {}", e)))?;

        Ok((conn, pong))
    }
}

#[async_trait]
impl FactStore for RedisFactStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn put(&self, chunk: &FactChunk) -> Result<()> {
        let value = serde_json::to_string(chunk)?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(&self.chunks_key, &chunk.id, value).await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<FactChunk>> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, String)> = conn.hgetall(&self.chunks_key).await?;

        let mut chunks = Vec::with_capacity(entries.len());
        for (id, raw) in entries {
            match serde_json::from_str::<FactChunk>(&raw) {
                Ok(mut chunk) => {
                    chunk.id = id;
                    chunks.push(chunk);
                }
                Err(e) => {
                    return Err(TwinError::Retrieval(format!(
                        "Malformed chunk {} in {}: {}",
                        id, self.chunks_key, e
                    )));
                }
            }
        }
        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.hlen(&self.chunks_key).await?)
    }

    async fn is_initialized(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(&self.initialized_key).await?)
    }

    async fn mark_initialized(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&self.initialized_key, "true").await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Redis ping failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::store::{load_profile, LoadOutcome};

    // Note: These tests require a running Redis instance
    // They are marked as ignored by default

    #[tokio::test]
    #[ignore]
    async fn test_redis_load_is_idempotent() {
        let namespace = format!("twin_test_{}", uuid::Uuid::new_v4());
        let store = RedisFactStore::connect("redis://127.0.0.1/", &namespace, Duration::from_secs(5))
            .await
            .unwrap();
        let chunks = vec![FactChunk::new("c1", "Skills", "Python and distributed systems")];

        assert_eq!(load_profile(&store, &chunks).await.unwrap(), LoadOutcome::Loaded(1));
        assert_eq!(
            load_profile(&store, &chunks).await.unwrap(),
            LoadOutcome::AlreadyInitialized
        );
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.ping().await);
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_error() {
        let result = RedisFactStore::connect("not a url", "ns", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TwinError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_within_budget() {
        let budget = Duration::from_millis(300);
        let started = std::time::Instant::now();

        let result = RedisFactStore::connect("redis://10.255.255.1/", "ns", budget).await;

        assert!(matches!(result, Err(TwinError::StoreUnavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
