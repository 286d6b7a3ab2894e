//! Store error types.

use thiserror::Error;

use kanjiquiz_core::error::QuizError;
use kanjiquiz_core::model::{SourceGroupId, SourceId};

/// Errors that can occur inside a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No source with this id.
    #[error("source not found: {0}")]
    SourceNotFound(SourceId),

    /// No source group with this id.
    #[error("source group not found: {0}")]
    SourceGroupNotFound(SourceGroupId),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Settings could not be loaded.
    #[error("invalid settings: {0}")]
    Settings(String),
}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => QuizError::transport(message),
            other => QuizError::generation(other.to_string()),
        }
    }
}
