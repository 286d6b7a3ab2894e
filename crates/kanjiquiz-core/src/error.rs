//! Engine error types.
//!
//! Every collaborator returns these so the session can tell a failed
//! generation (session never becomes active) apart from a failed write
//! (session stays where it was) without string matching.

use thiserror::Error;

/// Errors surfaced by the quiz engine and its collaborators.
#[derive(Debug, Error)]
pub enum QuizError {
    /// No eligible items, or the store failed while building questions.
    #[error("quiz generation failed: {message}")]
    Generation { message: String },

    /// An answer or bookmark mutation could not be persisted.
    #[error("failed to record: {message}")]
    Record { message: String },

    /// The store could not be reached at all.
    #[error("store unreachable: {message}")]
    Transport { message: String },

    /// A string that is not a single kanji.
    #[error("\"{value}\" is not a valid kanji")]
    InvalidKanji { value: String },
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, QuizError>;

impl QuizError {
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn record(message: impl Into<String>) -> Self {
        Self::Record {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_kanji(value: impl Into<String>) -> Self {
        Self::InvalidKanji {
            value: value.into(),
        }
    }

    /// Returns `true` if the store was unreachable rather than rejecting the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, QuizError::Transport { .. })
    }
}
