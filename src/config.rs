//! Service configuration
//!
//! Values come from an optional TOML file (`TWIN_CONFIG`, default
//! `config/twin.toml`) layered under `TWIN__SECTION__KEY` environment
//! variables. The well-known provider variables (`GROQ_API_KEY`,
//! `UPSTASH_VECTOR_REST_URL`, `REDIS_URL`, ...) are applied last.

use crate::error::{Result, TwinError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder shipped in sample `.env` files; treated as an absent key
const PLACEHOLDER_GROQ_KEY: &str = "your_groq_api_key";

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorProvider {
    Upstash,
    Qdrant,
    None,
}

#[derive(Debug, Deserialize)]
pub struct VectorConfig {
    #[serde(default = "default_vector_provider")]
    pub provider: VectorProvider,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Qdrant collection holding the profile chunks
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_cache")]
    pub cache_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    Redis,
    Memory,
    None,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: StoreProvider,
    /// Connection URL; may embed a password, hence secret
    #[serde(default)]
    pub url: Option<SecretString>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_retrieval_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Profile JSON with a `content_chunks` array
    #[serde(default = "default_profile_path")]
    pub path: Option<PathBuf>,
    /// Upsert the profile into the vector index when the index is empty
    #[serde(default)]
    pub seed_vector_index: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_body_bytes() -> usize { 64 * 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_vector_provider() -> VectorProvider { VectorProvider::Upstash }
fn default_collection() -> String { "digital_twin".to_string() }
fn default_vector_size() -> u64 { 1024 }
fn default_embedding_url() -> String { "http://localhost:8080/v1".to_string() }
fn default_embedding_model() -> String { "mxbai-embed-large-v1".to_string() }
fn default_embedding_cache() -> u64 { 1000 }
fn default_store_provider() -> StoreProvider { StoreProvider::Redis }
fn default_namespace() -> String { "digital_twin".to_string() }
fn default_generator_url() -> String { "https://api.groq.com/openai/v1".to_string() }
fn default_generator_model() -> String { "llama-3.1-8b-instant".to_string() }
fn default_generation_timeout_ms() -> u64 { 30_000 }
fn default_retry_attempts() -> usize { 2 }
fn default_retry_backoff_ms() -> u64 { 200 }
fn default_top_k() -> usize { 3 }
fn default_max_top_k() -> usize { 20 }
fn default_retrieval_timeout_ms() -> u64 { 10_000 }
fn default_profile_path() -> Option<PathBuf> { Some(PathBuf::from("digitaltwin.json")) }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_provider(),
            url: None,
            token: None,
            collection: default_collection(),
            vector_size: default_vector_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: default_embedding_url(),
            api_key: None,
            model: default_embedding_model(),
            cache_size: default_embedding_cache(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: None,
            namespace: default_namespace(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: default_generator_url(),
            api_key: None,
            model: default_generator_model(),
            timeout_ms: default_generation_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            timeout_ms: default_retrieval_timeout_ms(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            path: default_profile_path(),
            seed_vector_index: false,
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the optional config file and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("TWIN_CONFIG").unwrap_or_else(|_| "config/twin".to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("TWIN").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(source: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Apply the provider variables used by the hosted services
    pub fn with_env_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("GROQ_API_KEY") {
            self.generator.api_key = Some(SecretString::new(key));
        }

        if let Some(url) = var("UPSTASH_VECTOR_REST_URL") {
            self.vector.url = Some(url);
        }
        if let Some(token) = var("UPSTASH_VECTOR_REST_TOKEN") {
            self.vector.token = Some(SecretString::new(token));
        }
        if let Some(url) = var("QDRANT_URL") {
            if self.vector.provider == VectorProvider::Qdrant {
                self.vector.url = Some(url);
            }
        }

        if let Some(url) = var("EMBEDDING_API_URL") {
            self.embedding.api_url = url;
        }
        if let Some(key) = var("EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(SecretString::new(key));
        }

        if let Some(url) = var("REDIS_URL") {
            self.store.url = Some(SecretString::new(url));
        } else if let (Some(rest_url), Some(token)) = (
            var("UPSTASH_REDIS_REST_URL"),
            var("UPSTASH_REDIS_REST_TOKEN"),
        ) {
            if self.store.url.is_none() {
                self.store.url = Some(SecretString::new(upstash_redis_url(&rest_url, &token)));
            }
        }

        self
    }

    /// Generator credential, ignoring the sample placeholder
    pub fn generator_key(&self) -> Option<&str> {
        self.generator
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_GROQ_KEY)
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.default_top_k == 0 {
            return Err(TwinError::Configuration(
                "retrieval.default_top_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.max_top_k < self.retrieval.default_top_k {
            return Err(TwinError::Configuration(format!(
                "retrieval.max_top_k ({}) is below default_top_k ({})",
                self.retrieval.max_top_k, self.retrieval.default_top_k
            )));
        }
        Ok(())
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Outer budget for one answer: every attempt at `timeout` plus the
    /// exponential backoff sleeps between them
    pub fn call_budget(&self) -> Duration {
        let attempts = u32::try_from(self.retry_attempts.saturating_add(1)).unwrap_or(u32::MAX);
        let mut budget = self.timeout().saturating_mul(attempts);

        let mut backoff = self.retry_backoff();
        for _ in 0..self.retry_attempts {
            budget = budget.saturating_add(backoff);
            if budget == Duration::MAX {
                break;
            }
            backoff = backoff.saturating_mul(2);
        }
        budget
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Build a TLS Redis URL from an Upstash REST endpoint and token
fn upstash_redis_url(rest_url: &str, token: &str) -> String {
    let host = rest_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split([':', '/'])
        .next()
        .unwrap_or_default();
    format!("rediss://default:{}@{}:6379", token, host)
}
