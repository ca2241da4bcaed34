use thiserror::Error;

/// Error taxonomy shared across the crawling, embedding, and retrieval
/// pipelines.
///
/// Component crates (`docrag-fetcher`, `docrag-extractor`, `docrag-embedder`,
/// `docrag-reranker`, `docrag-store`) expose their own narrower error enums
/// (`FetchError`, `ExtractError`, `EmbedError`, `RerankError`, `StoreError`)
/// and convert into this one via a `From` impl at the crate boundary — the
/// public functions the ingestion processor and retrieval engine call — so a
/// failure's class survives across crate boundaries instead of flattening
/// into a string.
#[derive(Error, Debug)]
pub enum DocragError {
    #[error("transient failure, retryable: {0}")]
    Transient(String),

    #[error("permanent failure, not retried: {0}")]
    Permanent(String),

    #[error("blocked: challenge page or anti-bot response detected: {0}")]
    Blocked(String),

    #[error("malformed or empty content after extraction: {0}")]
    MalformedContent(String),

    #[error("embedding failure: {0}")]
    Embedding(String),

    #[error("store integrity error: {0}")]
    StoreIntegrity(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("query-time failure: {0}")]
    Query(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DocragError>;

impl DocragError {
    /// Whether the ingestion processor should abandon this URL for the
    /// current cycle rather than treat the failure as a hard pipeline abort.
    pub fn is_skip_for_cycle(&self) -> bool {
        matches!(
            self,
            DocragError::Transient(_) | DocragError::Blocked(_) | DocragError::MalformedContent(_)
        )
    }
}
