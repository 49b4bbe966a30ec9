//! Process-wide context built once at startup
//!
//! Each backend comes up independently; whatever fails is logged and left
//! out, and the surfaces are wired to whatever remains.

use crate::config::{Config, RetrievalConfig, StoreProvider, VectorProvider};
use crate::embedding::HttpEmbedder;
use crate::error::{Result, TwinError};
use crate::facts::{
    load_profile, FactStore, MemoryFactStore, ProfileData, RedisFactStore, VectorFactStore,
};
use crate::generation::{ChatClientConfig, ChatCompletionClient, GeneratorAdapter, TextGenerator};
use crate::pipeline::{PipelineProfile, QueryPipeline};
use crate::retrieval::{KeywordRetriever, Retriever, SemanticRetriever};
use crate::vector::{QdrantIndexConfig, QdrantVectorIndex, UpstashVectorIndex, VectorIndex};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Backends that initialized successfully
#[derive(Default, Clone)]
pub struct Backends {
    pub vector: Option<Arc<dyn VectorIndex>>,
    pub store: Option<Arc<dyn FactStore>>,
    pub generator: Option<Arc<dyn TextGenerator>>,
}

/// Which retrieval strategy a surface tries first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverPreference {
    Semantic,
    Keyword,
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppContext {
    pub http_pipeline: Arc<QueryPipeline>,
    pub mcp_pipeline: Arc<QueryPipeline>,
    /// Store queried by the command-surface health check
    pub mcp_store: Option<Arc<dyn FactStore>>,
    pub store_label: &'static str,
    pub vector_ready: bool,
    pub store_ready: bool,
    pub generator_ready: bool,
    pub retrieval: RetrievalConfig,
}

impl AppContext {
    /// Wire both surfaces from the available backends
    pub fn new(
        backends: Backends,
        retrieval: RetrievalConfig,
        generation_timeout: Duration,
        store_label: &'static str,
    ) -> Self {
        let http_profile = PipelineProfile::digital_twin();
        let mcp_profile = PipelineProfile::assistant();

        let (http_retriever, _) = select_retriever(RetrieverPreference::Semantic, &backends);
        let (mcp_retriever, mcp_store) = select_retriever(RetrieverPreference::Keyword, &backends);

        info!(
            "Retrievers selected: http={}, mcp={}",
            http_retriever.backend(),
            mcp_retriever.backend()
        );

        let http_pipeline = QueryPipeline::new(
            http_retriever,
            GeneratorAdapter::new(
                backends.generator.clone(),
                http_profile.generation.clone(),
                generation_timeout,
            ),
            &http_profile,
            retrieval.timeout(),
        );
        let mcp_pipeline = QueryPipeline::new(
            mcp_retriever,
            GeneratorAdapter::new(
                backends.generator.clone(),
                mcp_profile.generation.clone(),
                generation_timeout,
            ),
            &mcp_profile,
            retrieval.timeout(),
        );

        Self {
            http_pipeline: Arc::new(http_pipeline),
            mcp_pipeline: Arc::new(mcp_pipeline),
            mcp_store,
            store_label,
            vector_ready: backends.vector.is_some(),
            store_ready: backends.store.is_some(),
            generator_ready: backends.generator.is_some(),
            retrieval,
        }
    }

    /// Connect every configured backend, load the profile and wire the surfaces
    pub async fn initialize(config: &Config) -> Self {
        let profile = load_profile_file(config).await;

        let generator = match build_generator(config) {
            Ok(generator) => {
                info!("Generator client initialized: model={}", config.generator.model);
                Some(generator)
            }
            Err(e) => {
                warn!("Generator disabled: {}", e);
                None
            }
        };

        let vector = match connect_vector(config).await {
            Ok(Some(index)) => {
                info!("Connected to {} vector index", index.name());
                seed_vector_index(config, &index, profile.as_ref()).await;
                Some(index)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Vector index unavailable: {}", e);
                None
            }
        };

        let store = match connect_store(config).await {
            Ok(Some(store)) => match seed_store(&store, profile.as_ref()).await {
                Ok(()) => Some(store),
                Err(e) => {
                    warn!("Failed to initialize profile data in {} store: {}", store.backend(), e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Key-value store unavailable: {}", e);
                None
            }
        };

        let backends = Backends {
            vector,
            store,
            generator,
        };

        Self::new(
            backends,
            config.retrieval.clone(),
            config.generator.call_budget(),
            store_label(config.store.provider),
        )
    }
}

/// Pick the preferred retriever, fall back to the other backend, or install
/// the preferred one in its unavailable form
pub fn select_retriever(
    preference: RetrieverPreference,
    backends: &Backends,
) -> (Arc<dyn Retriever>, Option<Arc<dyn FactStore>>) {
    let semantic = backends.vector.clone().map(|index| {
        let store: Arc<dyn FactStore> = Arc::new(VectorFactStore::new(index.clone()));
        (Arc::new(SemanticRetriever::new(index)) as Arc<dyn Retriever>, store)
    });
    let keyword = backends.store.clone().map(|store| {
        (Arc::new(KeywordRetriever::new(store.clone())) as Arc<dyn Retriever>, store)
    });

    let chosen = match preference {
        RetrieverPreference::Semantic => semantic.or(keyword),
        RetrieverPreference::Keyword => keyword.or(semantic),
    };

    match chosen {
        Some((retriever, store)) => (retriever, Some(store)),
        None => {
            warn!("No retrieval backend available for {:?} surface", preference);
            let retriever: Arc<dyn Retriever> = match preference {
                RetrieverPreference::Semantic => Arc::new(SemanticRetriever::unavailable()),
                RetrieverPreference::Keyword => Arc::new(KeywordRetriever::unavailable()),
            };
            (retriever, None)
        }
    }
}

fn store_label(provider: StoreProvider) -> &'static str {
    match provider {
        StoreProvider::Redis => "redis",
        StoreProvider::Memory => "memory",
        StoreProvider::None => "store",
    }
}

async fn load_profile_file(config: &Config) -> Option<ProfileData> {
    let path = config.profile.path.as_ref()?;
    if !path.exists() {
        info!("No profile file at {}, skipping load", path.display());
        return None;
    }

    match ProfileData::load(path).await {
        Ok(profile) => {
            info!("Loaded {} content chunks from {}", profile.chunks.len(), path.display());
            Some(profile)
        }
        Err(e) => {
            warn!("Error loading profile data: {}", e);
            None
        }
    }
}

fn build_generator(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    let api_key = config
        .generator_key()
        .ok_or_else(|| TwinError::Configuration("GROQ_API_KEY not set or using default value".to_string()))?;

    let client = ChatCompletionClient::new(ChatClientConfig {
        api_url: config.generator.api_url.clone(),
        api_key: SecretString::new(api_key.to_string()),
        model: config.generator.model.clone(),
        timeout: config.generator.timeout(),
        retry_attempts: config.generator.retry_attempts,
        retry_backoff: config.generator.retry_backoff(),
    })?;

    Ok(Arc::new(client))
}

async fn connect_vector(config: &Config) -> Result<Option<Arc<dyn VectorIndex>>> {
    let timeout = config.retrieval.timeout();

    match config.vector.provider {
        VectorProvider::None => Ok(None),
        VectorProvider::Upstash => {
            let index = UpstashVectorIndex::new(
                config.vector.url.as_deref(),
                config.vector.token.as_ref(),
                timeout,
            )?;
            let index: Arc<dyn VectorIndex> = Arc::new(index);
            let count = index.count().await?;
            info!("Current vectors in database: {}", count);
            Ok(Some(index))
        }
        VectorProvider::Qdrant => {
            let url = config
                .vector
                .url
                .clone()
                .ok_or_else(|| TwinError::Configuration("vector.url is not set for qdrant".to_string()))?;
            let embedder = HttpEmbedder::new(
                &config.embedding.api_url,
                config.embedding.api_key.as_ref(),
                &config.embedding.model,
                config.embedding.cache_size,
                timeout,
            )?;
            let index = QdrantVectorIndex::connect(
                QdrantIndexConfig {
                    url,
                    api_key: config.vector.token.as_ref().map(|t| t.expose_secret().clone()),
                    collection_name: config.vector.collection.clone(),
                    vector_size: config.vector.vector_size,
                    connect_timeout: timeout,
                },
                Arc::new(embedder),
            )
            .await?;
            Ok(Some(Arc::new(index)))
        }
    }
}

async fn connect_store(config: &Config) -> Result<Option<Arc<dyn FactStore>>> {
    match config.store.provider {
        StoreProvider::None => Ok(None),
        StoreProvider::Memory => Ok(Some(Arc::new(MemoryFactStore::new()))),
        StoreProvider::Redis => {
            let url = config
                .store
                .url
                .as_ref()
                .ok_or_else(|| TwinError::Configuration("Missing Redis URL or token".to_string()))?;
            let store = RedisFactStore::connect(
                url.expose_secret(),
                &config.store.namespace,
                config.retrieval.timeout(),
            )
            .await?;
            Ok(Some(Arc::new(store)))
        }
    }
}

async fn seed_store(store: &Arc<dyn FactStore>, profile: Option<&ProfileData>) -> Result<()> {
    if let Some(profile) = profile {
        load_profile(store.as_ref(), &profile.chunks).await?;
    }
    Ok(())
}

async fn seed_vector_index(config: &Config, index: &Arc<dyn VectorIndex>, profile: Option<&ProfileData>) {
    let Some(profile) = profile.filter(|_| config.profile.seed_vector_index) else {
        return;
    };

    let store = VectorFactStore::new(index.clone());
    if let Err(e) = load_profile(&store, &profile.chunks).await {
        warn!("Failed to seed {} index: {}", index.name(), e);
    }
}
