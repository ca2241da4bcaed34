use docrag_common::DocragError;
use thiserror::Error;

/// Narrow failure classification for cross-encoder model loading and
/// scoring. Converts into [`DocragError`] at the crate boundary (the
/// [`crate::Reranker`] trait methods).
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding failure: {0}")]
    Embedding(String),
}

impl From<RerankError> for DocragError {
    fn from(e: RerankError) -> Self {
        match e {
            RerankError::Configuration(m) => DocragError::Configuration(m),
            RerankError::Embedding(m) => DocragError::Embedding(m),
        }
    }
}
