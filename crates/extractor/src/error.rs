use docrag_common::DocragError;
use thiserror::Error;

/// Narrow failure classification for the extraction pipeline. Converts into
/// [`DocragError`] at the crate boundary (the [`crate::extract`] entry
/// point).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed or empty content after extraction: {0}")]
    MalformedContent(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<ExtractError> for DocragError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::MalformedContent(m) => DocragError::MalformedContent(m),
            ExtractError::Configuration(m) => DocragError::Configuration(m),
        }
    }
}
