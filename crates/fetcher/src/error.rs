use docrag_common::DocragError;
use thiserror::Error;

/// Narrow failure classification for a single fetch attempt. Converts into
/// [`DocragError`] at the crate boundary (the [`crate::Fetcher`] trait
/// methods), so callers outside this crate only ever see the shared
/// taxonomy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient failure, retryable: {0}")]
    Transient(String),

    #[error("permanent failure, not retried: {0}")]
    Permanent(String),

    #[error("blocked: challenge page or anti-bot response detected: {0}")]
    Blocked(String),
}

impl From<FetchError> for DocragError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Transient(m) => DocragError::Transient(m),
            FetchError::Permanent(m) => DocragError::Permanent(m),
            FetchError::Blocked(m) => DocragError::Blocked(m),
        }
    }
}
