use std::sync::Arc;

use rag_query_core::cache::CacheManager;
use rag_query_core::config::Config;
use rag_query_core::embedding::EmbeddingService;
use rag_query_core::error::CoreError;
use rag_query_core::monitoring::MonitoringService;
use rag_query_core::processor::QueryProcessor;
use rag_query_core::registry::DataSourceRegistry;
use rag_query_core::server::SearchServer;
use rag_query_core::vector::build_vector_store;

const FALLBACK_MEMORY_CACHE_CAPACITY: usize = 10_000;

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let config = Config::from_env()?;
    MonitoringService::init_tracing(&config)?;
    config.validate()?;

    tracing::info!("starting rag-query-core");
    tracing::info!("server will listen on {}:{}", config.server.host, config.server.port);

    // Redis is preferred; an unreachable cache degrades to an in-memory
    // fallback rather than failing startup (§9 graceful-degradation note).
    let cache = match CacheManager::new_redis(&config.cache).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!("redis cache unavailable ({e}), falling back to in-memory cache");
            Arc::new(CacheManager::new_memory(FALLBACK_MEMORY_CACHE_CAPACITY))
        }
    };

    let vector_store: Arc<dyn rag_query_core::vector::VectorStore> =
        Arc::from(build_vector_store(&config.database.vector).await?);
    vector_store.initialize().await?;

    let registry = Arc::new(DataSourceRegistry::new());
    let embedding = Arc::new(EmbeddingService::new(config.embedding.clone(), Some(cache.clone())));
    let monitoring = Arc::new(MonitoringService::new(&config, cache.clone())?);
    let processor = Arc::new(QueryProcessor::new(
        &config,
        cache,
        registry.clone(),
        embedding,
        vector_store,
        Some(monitoring.clone()),
    ));

    let server = SearchServer::new(&config, processor, registry, monitoring);
    server.run().await
}
