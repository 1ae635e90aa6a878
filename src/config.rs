use std::env;

use crate::error::CoreError;

/// Top-level configuration loaded from environment variables (§6).
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub processor: ProcessorConfig,
    pub response: ResponseConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max: u64,
    pub request_timeout_ms: u64,
}

/// Vector back-end selection and connection parameters.
#[derive(Debug, Clone)]
pub struct VectorDatabaseConfig {
    pub provider: String,
    pub dimension: usize,
    pub connection_string: Option<String>,
    pub api_key: Option<String>,
    pub index_name: Option<String>,
    pub metric: String,
    pub index_type: Option<String>,
}

/// Metadata store connection parameters (author/content metadata, not
/// vectors).
#[derive(Debug, Clone)]
pub struct MetadataDatabaseConfig {
    pub provider: String,
    pub connection_string: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub vector: VectorDatabaseConfig,
    pub metadata: MetadataDatabaseConfig,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheTtlConfig {
    pub query_results_secs: u64,
    pub embeddings_secs: u64,
    pub health_checks_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub ttl: CacheTtlConfig,
    pub max_memory_bytes: u64,
    pub eviction_policy: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub max_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct HybridSearchConfig {
    pub enabled: bool,
    pub vector_weight: f32,
    pub keyword_weight: f32,
}

#[derive(Debug, Clone)]
pub struct RerankingConfig {
    pub enabled: bool,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub similarity_threshold: f32,
    pub hybrid: HybridSearchConfig,
    pub reranking: RerankingConfig,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub max_concurrent_queries: usize,
    pub default_timeout_ms: u64,
    pub parallel_search_enabled: bool,
    pub cache_enabled: bool,
    pub min_confidence_threshold: f32,
    pub max_results_per_source: usize,
}

/// Response Generator configuration (§4.H, §6).
#[derive(Debug, Clone)]
pub struct ResponseConfig {
    pub max_response_length: usize,
    pub min_sources_for_synthesis: usize,
    pub confidence_threshold: f32,
    pub citation_style: crate::types::CitationStyle,
    pub coherence_check_enabled: bool,
    pub max_sources_in_response: usize,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub health_check: HealthCheckConfig,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_citation_style(s: &str) -> Result<crate::types::CitationStyle, CoreError> {
    use crate::types::CitationStyle;
    match s {
        "inline" => Ok(CitationStyle::Inline),
        "numbered" => Ok(CitationStyle::Numbered),
        "footnote" => Ok(CitationStyle::Footnote),
        other => Err(CoreError::Validation(format!("unknown citation style: {other}"))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, CoreError>
where
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| CoreError::Validation(format!("invalid {key}: {e}")))
}

impl Config {
    /// Load configuration from environment variables, mirroring the
    /// teacher's `Config::from_env` pattern: best-effort `.env` load,
    /// per-field parsing with defaults, then full cross-field validation.
    pub fn from_env() -> Result<Self, CoreError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::warn!("could not load .env file: {}", e);
        }

        let config = Config {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: parse_env("SERVER_PORT", "8080")?,
                cors_origins: env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", "60")?,
                rate_limit_max: parse_env("RATE_LIMIT_MAX", "100")?,
                request_timeout_ms: parse_env("REQUEST_TIMEOUT_MS", "500")?,
            },
            database: DatabaseConfig {
                vector: VectorDatabaseConfig {
                    provider: env_or("VECTOR_DB_PROVIDER", "flat"),
                    dimension: parse_env("VECTOR_DB_DIMENSION", "384")?,
                    connection_string: env::var("VECTOR_DB_CONNECTION_STRING").ok(),
                    api_key: env::var("VECTOR_DB_API_KEY").ok(),
                    index_name: env::var("VECTOR_DB_INDEX_NAME").ok(),
                    metric: env_or("VECTOR_DB_METRIC", "cosine"),
                    index_type: env::var("VECTOR_DB_INDEX_TYPE").ok(),
                },
                metadata: MetadataDatabaseConfig {
                    provider: env_or("METADATA_DB_PROVIDER", "postgres"),
                    connection_string: env_or("METADATA_DB_CONNECTION_STRING", ""),
                },
                max_connections: parse_env("DB_MAX_CONNECTIONS", "10")?,
                connection_timeout_secs: parse_env("DB_CONNECTION_TIMEOUT_SECS", "30")?,
            },
            cache: CacheConfig {
                host: env_or("CACHE_HOST", "localhost"),
                port: parse_env("CACHE_PORT", "6379")?,
                password: env::var("CACHE_PASSWORD").ok(),
                db: parse_env("CACHE_DB", "0")?,
                ttl: CacheTtlConfig {
                    query_results_secs: parse_env("CACHE_TTL_QUERY_RESULTS_SECS", "300")?,
                    embeddings_secs: parse_env("CACHE_TTL_EMBEDDINGS_SECS", "86400")?,
                    health_checks_secs: parse_env("CACHE_TTL_HEALTH_CHECKS_SECS", "30")?,
                },
                max_memory_bytes: parse_env("CACHE_MAX_MEMORY_BYTES", "268435456")?,
                eviction_policy: env_or("CACHE_EVICTION_POLICY", "lru"),
            },
            embedding: EmbeddingConfig {
                provider: env_or("EMBEDDING_PROVIDER", "local"),
                model: env_or("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),
                api_key: env::var("EMBEDDING_API_KEY").ok(),
                dimension: parse_env("EMBEDDING_DIMENSION", "384")?,
                batch_size: parse_env("EMBEDDING_BATCH_SIZE", "32")?,
                timeout_ms: parse_env("EMBEDDING_TIMEOUT_MS", "5000")?,
                cache_enabled: parse_env("EMBEDDING_CACHE_ENABLED", "true")?,
                cache_ttl_secs: parse_env("EMBEDDING_CACHE_TTL_SECS", "86400")?,
                max_tokens: parse_env("EMBEDDING_MAX_TOKENS", "512")?,
            },
            search: SearchConfig {
                default_top_k: parse_env("SEARCH_DEFAULT_TOP_K", "10")?,
                max_top_k: parse_env("SEARCH_MAX_TOP_K", "100")?,
                similarity_threshold: parse_env("SEARCH_SIMILARITY_THRESHOLD", "0.5")?,
                hybrid: HybridSearchConfig {
                    enabled: parse_env("HYBRID_SEARCH_ENABLED", "true")?,
                    vector_weight: parse_env("HYBRID_VECTOR_WEIGHT", "0.7")?,
                    keyword_weight: parse_env("HYBRID_KEYWORD_WEIGHT", "0.3")?,
                },
                reranking: RerankingConfig {
                    enabled: parse_env("RERANKING_ENABLED", "false")?,
                    model: env::var("RERANKING_MODEL").ok(),
                },
            },
            processor: ProcessorConfig {
                max_concurrent_queries: parse_env("MAX_CONCURRENT_QUERIES", "10")?,
                default_timeout_ms: parse_env("DEFAULT_TIMEOUT_MS", "5000")?,
                parallel_search_enabled: parse_env("PARALLEL_SEARCH_ENABLED", "true")?,
                cache_enabled: parse_env("PROCESSOR_CACHE_ENABLED", "true")?,
                min_confidence_threshold: parse_env("MIN_CONFIDENCE_THRESHOLD", "0.3")?,
                max_results_per_source: parse_env("MAX_RESULTS_PER_SOURCE", "20")?,
            },
            response: ResponseConfig {
                max_response_length: parse_env("RESPONSE_MAX_LENGTH", "2000")?,
                min_sources_for_synthesis: parse_env("RESPONSE_MIN_SOURCES_FOR_SYNTHESIS", "1")?,
                confidence_threshold: parse_env("RESPONSE_CONFIDENCE_THRESHOLD", "0.3")?,
                citation_style: parse_citation_style(&env_or("RESPONSE_CITATION_STYLE", "inline"))?,
                coherence_check_enabled: parse_env("RESPONSE_COHERENCE_CHECK_ENABLED", "true")?,
                max_sources_in_response: parse_env("RESPONSE_MAX_SOURCES_IN_RESPONSE", "5")?,
            },
            monitoring: MonitoringConfig {
                metrics: MetricsConfig {
                    enabled: parse_env("METRICS_ENABLED", "true")?,
                    port: parse_env("METRICS_PORT", "9090")?,
                    path: env_or("METRICS_PATH", "/metrics"),
                },
                logging: LoggingConfig {
                    level: env_or("LOG_LEVEL", "info"),
                    format: env_or("LOG_FORMAT", "json"),
                    file: env::var("LOG_FILE").ok(),
                },
                health_check: HealthCheckConfig {
                    interval_secs: parse_env("HEALTH_CHECK_INTERVAL_SECS", "30")?,
                    timeout_secs: parse_env("HEALTH_CHECK_TIMEOUT_SECS", "5")?,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Full cross-section validation, including the two cross-field
    /// invariants: embedding dimension must equal vector-store dimension,
    /// and hybrid search weights must sum to 1.0.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.server.port == 0 {
            return Err(CoreError::Validation("server port cannot be 0".to_string()));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(CoreError::Validation(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.database.vector.dimension == 0 {
            return Err(CoreError::Validation(
                "vector database dimension must be greater than 0".to_string(),
            ));
        }
        if !matches!(self.database.vector.metric.as_str(), "l2" | "cosine" | "inner-product") {
            return Err(CoreError::Validation(format!(
                "unknown vector metric: {}",
                self.database.vector.metric
            )));
        }

        if self.cache.max_memory_bytes == 0 {
            return Err(CoreError::Validation(
                "cache max memory must be greater than 0".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(CoreError::Validation(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        if self.embedding.dimension != self.database.vector.dimension {
            return Err(CoreError::Validation(format!(
                "embedding dimension ({}) must equal vector database dimension ({})",
                self.embedding.dimension, self.database.vector.dimension
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(CoreError::Validation(
                "embedding batch size must be greater than 0".to_string(),
            ));
        }

        if self.search.hybrid.enabled {
            let sum = self.search.hybrid.vector_weight + self.search.hybrid.keyword_weight;
            if (sum - 1.0).abs() > 1e-3 {
                return Err(CoreError::Validation(format!(
                    "hybrid search vectorWeight + keywordWeight must sum to 1.0, got {sum}"
                )));
            }
        }
        if self.search.max_top_k < self.search.default_top_k {
            return Err(CoreError::Validation(
                "search.maxTopK must be >= search.defaultTopK".to_string(),
            ));
        }

        if self.processor.max_concurrent_queries == 0 {
            return Err(CoreError::Validation(
                "processor.maxConcurrentQueries must be greater than 0".to_string(),
            ));
        }
        if self.processor.default_timeout_ms == 0 {
            return Err(CoreError::Validation(
                "processor.defaultTimeoutMs must be greater than 0".to_string(),
            ));
        }

        if self.response.max_sources_in_response == 0 {
            return Err(CoreError::Validation(
                "response.maxSourcesInResponse must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.response.confidence_threshold) {
            return Err(CoreError::Validation(
                "response.confidenceThreshold must be within [0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_origins: Vec::new(),
                rate_limit_window_secs: 60,
                rate_limit_max: 100,
                request_timeout_ms: 500,
            },
            database: DatabaseConfig {
                vector: VectorDatabaseConfig {
                    provider: "flat".to_string(),
                    dimension: 384,
                    connection_string: None,
                    api_key: None,
                    index_name: None,
                    metric: "cosine".to_string(),
                    index_type: None,
                },
                metadata: MetadataDatabaseConfig {
                    provider: "postgres".to_string(),
                    connection_string: String::new(),
                },
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            cache: CacheConfig {
                host: "localhost".to_string(),
                port: 6379,
                password: None,
                db: 0,
                ttl: CacheTtlConfig {
                    query_results_secs: 300,
                    embeddings_secs: 86_400,
                    health_checks_secs: 30,
                },
                max_memory_bytes: 256 * 1024 * 1024,
                eviction_policy: "lru".to_string(),
            },
            embedding: EmbeddingConfig {
                provider: "local".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                api_key: None,
                dimension: 384,
                batch_size: 32,
                timeout_ms: 5000,
                cache_enabled: true,
                cache_ttl_secs: 86_400,
                max_tokens: 512,
            },
            search: SearchConfig {
                default_top_k: 10,
                max_top_k: 100,
                similarity_threshold: 0.5,
                hybrid: HybridSearchConfig {
                    enabled: true,
                    vector_weight: 0.7,
                    keyword_weight: 0.3,
                },
                reranking: RerankingConfig {
                    enabled: false,
                    model: None,
                },
            },
            processor: ProcessorConfig {
                max_concurrent_queries: 10,
                default_timeout_ms: 5000,
                parallel_search_enabled: true,
                cache_enabled: true,
                min_confidence_threshold: 0.3,
                max_results_per_source: 20,
            },
            response: ResponseConfig {
                max_response_length: 2000,
                min_sources_for_synthesis: 1,
                confidence_threshold: 0.3,
                citation_style: crate::types::CitationStyle::Inline,
                coherence_check_enabled: true,
                max_sources_in_response: 5,
            },
            monitoring: MonitoringConfig {
                metrics: MetricsConfig {
                    enabled: true,
                    port: 9090,
                    path: "/metrics".to_string(),
                },
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: "json".to_string(),
                    file: None,
                },
                health_check: HealthCheckConfig {
                    interval_secs: 30,
                    timeout_secs: 5,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn mismatched_embedding_and_vector_dimension_fails() {
        let mut config = Config::default();
        config.embedding.dimension = 512;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn hybrid_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.search.hybrid.vector_weight = 0.9;
        config.search.hybrid.keyword_weight = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn hybrid_validation_skipped_when_disabled() {
        let mut config = Config::default();
        config.search.hybrid.enabled = false;
        config.search.hybrid.vector_weight = 0.9;
        config.search.hybrid.keyword_weight = 0.9;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_port_fails_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_top_k_below_default_fails() {
        let mut config = Config::default();
        config.search.max_top_k = 5;
        config.search.default_top_k = 10;
        assert!(config.validate().is_err());
    }
}
