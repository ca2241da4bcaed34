use serde::{Deserialize, Serialize};

use crate::error::{DocragError, Result};

/// Single immutable configuration value, built once at startup from
/// environment variables and handed by reference to every component
/// constructor. See spec §6 and SPEC_FULL §4.10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub target_url: String,
    pub embedding: EmbeddingConfig,
    pub reranker: RerankerConfig,
    pub storage: StorageConfig,
    pub crawl: CrawlConfig,
    pub hybrid_search: bool,
    pub http_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingMode {
    Api,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub model: String,
    pub dim: usize,
    pub max_length: usize,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub max_concurrent_remote_calls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub model: String,
    pub use_reranking: bool,
    pub apply_calibration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub batch_size: i64,
    pub max_concurrent: usize,
    pub processor_batch_size: usize,
    pub crawl_interval_secs: f64,
    pub chunk_size: usize,
    pub contextual_annotation: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            batch_size: 30,
            max_concurrent: 30,
            processor_batch_size: 5,
            crawl_interval_secs: 0.5,
            chunk_size: 5000,
            contextual_annotation: false,
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        DocragError::Configuration(format!("missing required environment variable: {key}"))
    })
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Build the full configuration from environment variables, failing
    /// fast with [`DocragError::Configuration`] if a required key is
    /// missing or malformed. Callers (see `docrag-cli`) treat this failure
    /// as fatal and exit with a non-zero status.
    pub fn from_env() -> Result<Self> {
        let mode = match env_var("EMBEDDING_MODE")?.to_ascii_lowercase().as_str() {
            "api" => EmbeddingMode::Api,
            "local" => EmbeddingMode::Local,
            other => {
                return Err(DocragError::Configuration(format!(
                    "EMBEDDING_MODE must be 'api' or 'local', got '{other}'"
                )))
            }
        };

        let embedding = EmbeddingConfig {
            mode,
            model: env_var("EMBEDDING_MODEL")?,
            dim: env_var("EMBEDDING_DIM")?.parse().map_err(|_| {
                DocragError::Configuration("EMBEDDING_DIM must be an integer".into())
            })?,
            max_length: env_var("EMBEDDING_MAX_LENGTH")?.parse().map_err(|_| {
                DocragError::Configuration("EMBEDDING_MAX_LENGTH must be an integer".into())
            })?,
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            api_base_url: std::env::var("EMBEDDING_API_BASE_URL").ok(),
            max_concurrent_remote_calls: env_parse_or("EMBEDDING_MAX_CONCURRENT", 4),
        };

        let reranker = RerankerConfig {
            model: env_var_or("RERANKER_MODEL", ""),
            use_reranking: env_parse_or("USE_RERANKING", false),
            apply_calibration: env_parse_or("RERANKER_APPLY_CALIBRATION", false),
        };

        let storage = StorageConfig {
            database_url: env_var("DATABASE_URL")?,
            min_connections: env_parse_or("DATABASE_MIN_CONNECTIONS", 1),
            max_connections: env_parse_or("DATABASE_MAX_CONNECTIONS", 10),
        };

        let defaults = CrawlConfig::default();
        let crawl = CrawlConfig {
            batch_size: env_parse_or("CRAWLER_BATCH_SIZE", defaults.batch_size),
            max_concurrent: env_parse_or("CRAWLER_MAX_CONCURRENT", defaults.max_concurrent),
            processor_batch_size: env_parse_or(
                "PROCESSOR_BATCH_SIZE",
                defaults.processor_batch_size,
            ),
            crawl_interval_secs: env_parse_or("CRAWL_INTERVAL", defaults.crawl_interval_secs),
            chunk_size: env_parse_or("CHUNK_SIZE", defaults.chunk_size),
            contextual_annotation: env_parse_or(
                "CONTEXTUAL_ANNOTATION",
                defaults.contextual_annotation,
            ),
        };

        Ok(Self {
            target_url: env_var("TARGET_URL")?,
            embedding,
            reranker,
            storage,
            crawl,
            hybrid_search: env_parse_or("USE_HYBRID_SEARCH", false),
            http_port: env_parse_or("HTTP_PORT", 3000),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_docrag_env() {
        for key in [
            "EMBEDDING_MODE",
            "EMBEDDING_MODEL",
            "EMBEDDING_DIM",
            "EMBEDDING_MAX_LENGTH",
            "DATABASE_URL",
            "TARGET_URL",
            "CRAWLER_BATCH_SIZE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn from_env_fails_fast_on_missing_required_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_docrag_env();

        let result = Config::from_env();
        assert!(matches!(result, Err(DocragError::Configuration(_))));
    }

    #[test]
    fn from_env_applies_reference_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_docrag_env();
        std::env::set_var("EMBEDDING_MODE", "api");
        std::env::set_var("EMBEDDING_MODEL", "text-embedding-3-large");
        std::env::set_var("EMBEDDING_DIM", "2560");
        std::env::set_var("EMBEDDING_MAX_LENGTH", "8191");
        std::env::set_var("DATABASE_URL", "postgres://localhost/docs");
        std::env::set_var("TARGET_URL", "https://docs.example.com");

        let config = Config::from_env().unwrap();
        assert_eq!(config.crawl.batch_size, 30);
        assert_eq!(config.crawl.max_concurrent, 30);
        assert_eq!(config.crawl.processor_batch_size, 5);
        assert_eq!(config.crawl.chunk_size, 5000);
        assert!(!config.hybrid_search);

        clear_docrag_env();
    }

    #[test]
    fn from_env_rejects_unknown_embedding_mode() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_docrag_env();
        std::env::set_var("EMBEDDING_MODE", "quantum");

        let result = Config::from_env();
        assert!(matches!(result, Err(DocragError::Configuration(_))));

        clear_docrag_env();
    }
}
