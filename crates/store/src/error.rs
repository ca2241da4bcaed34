use docrag_common::DocragError;
use thiserror::Error;

/// Narrow failure classification for storage operations. Converts into
/// [`DocragError`] at the crate boundary (the [`crate::Store`] methods).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store integrity error: {0}")]
    StoreIntegrity(String),

    #[error("query-time failure: {0}")]
    Query(String),
}

impl From<StoreError> for DocragError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StoreIntegrity(m) => DocragError::StoreIntegrity(m),
            StoreError::Query(m) => DocragError::Query(m),
        }
    }
}
