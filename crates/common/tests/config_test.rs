use docrag_common::{Config, DocragError, EmbeddingMode};
use std::sync::Mutex;

// Environment variables are process-global; serialize tests that touch them
// across this file and config.rs's own inline tests would race if run
// concurrently, so every test here takes the same lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const REQUIRED_KEYS: &[&str] = &[
    "EMBEDDING_MODE",
    "EMBEDDING_MODEL",
    "EMBEDDING_DIM",
    "EMBEDDING_MAX_LENGTH",
    "DATABASE_URL",
    "TARGET_URL",
];

const ALL_KEYS: &[&str] = &[
    "EMBEDDING_MODE",
    "EMBEDDING_MODEL",
    "EMBEDDING_DIM",
    "EMBEDDING_MAX_LENGTH",
    "EMBEDDING_API_KEY",
    "EMBEDDING_API_BASE_URL",
    "EMBEDDING_MAX_CONCURRENT",
    "RERANKER_MODEL",
    "USE_RERANKING",
    "RERANKER_APPLY_CALIBRATION",
    "DATABASE_URL",
    "DATABASE_MIN_CONNECTIONS",
    "DATABASE_MAX_CONNECTIONS",
    "TARGET_URL",
    "CRAWLER_BATCH_SIZE",
    "CRAWLER_MAX_CONCURRENT",
    "PROCESSOR_BATCH_SIZE",
    "CRAWL_INTERVAL",
    "CHUNK_SIZE",
    "USE_HYBRID_SEARCH",
];

fn clear_all() {
    for key in ALL_KEYS {
        std::env::remove_var(key);
    }
}

fn set_required() {
    std::env::set_var("EMBEDDING_MODE", "local");
    std::env::set_var("EMBEDDING_MODEL", "bge-small-en-v1.5");
    std::env::set_var("EMBEDDING_DIM", "384");
    std::env::set_var("EMBEDDING_MAX_LENGTH", "512");
    std::env::set_var("DATABASE_URL", "postgres://localhost/docs");
    std::env::set_var("TARGET_URL", "https://docs.example.com");
}

#[test]
fn from_env_succeeds_once_every_required_key_is_present() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    set_required();

    let config = Config::from_env().unwrap();
    assert_eq!(config.embedding.mode, EmbeddingMode::Local);
    assert_eq!(config.embedding.dim, 384);
    assert_eq!(config.storage.database_url, "postgres://localhost/docs");

    clear_all();
}

#[test]
fn from_env_reports_each_missing_required_key_individually() {
    let _guard = ENV_LOCK.lock().unwrap();

    for &missing in REQUIRED_KEYS {
        clear_all();
        set_required();
        std::env::remove_var(missing);

        let result = Config::from_env();
        assert!(
            matches!(result, Err(DocragError::Configuration(_))),
            "expected Configuration error when {missing} is absent"
        );
    }

    clear_all();
}

#[test]
fn from_env_honors_overrides_for_crawl_tuning() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_all();
    set_required();
    std::env::set_var("CRAWLER_BATCH_SIZE", "10");
    std::env::set_var("CRAWLER_MAX_CONCURRENT", "2");
    std::env::set_var("USE_HYBRID_SEARCH", "true");

    let config = Config::from_env().unwrap();
    assert_eq!(config.crawl.batch_size, 10);
    assert_eq!(config.crawl.max_concurrent, 2);
    assert!(config.hybrid_search);

    clear_all();
}
