use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No lexical index has been built or the persisted one is gone.
    #[error("Lexical index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Semantic backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("Semantic backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid top_k {top_k}: must be between 1 and {max}")]
    InvalidTopK { top_k: usize, max: usize },

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn operation(e: impl std::fmt::Display) -> Self {
        Error::Operation(e.to_string())
    }

    pub fn unreachable(e: impl std::fmt::Display) -> Self {
        Error::BackendUnreachable(e.to_string())
    }

    /// Loss of the semantic signal: unreachable service or timeout.
    pub fn is_semantic_loss(&self) -> bool {
        matches!(self, Error::BackendUnreachable(_) | Error::Timeout(_))
    }

    /// Errors the caller caused and must fix; never absorbed into a degraded result.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::InvalidQuery(_) | Error::InvalidTopK { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
