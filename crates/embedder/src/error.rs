use docrag_common::DocragError;
use thiserror::Error;

/// Narrow failure classification for embedding generation, local or remote.
/// Converts into [`DocragError`] at the crate boundary (the [`crate::Embedder`]
/// trait methods and the provider constructors).
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding failure: {0}")]
    Embedding(String),

    #[error("transient failure, retryable: {0}")]
    Transient(String),
}

impl From<EmbedError> for DocragError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::Configuration(m) => DocragError::Configuration(m),
            EmbedError::Embedding(m) => DocragError::Embedding(m),
            EmbedError::Transient(m) => DocragError::Transient(m),
        }
    }
}
