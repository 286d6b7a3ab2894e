//! Collaborator trait definitions.
//!
//! The engine never touches storage directly. These async traits are
//! implemented by `kanjiquiz-store` (in-memory and mock stores) or by a
//! host-provided adapter over IPC/HTTP. Every read returns an owned
//! snapshot, never a live reference.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    Bookmark, BookmarkId, Frequency, KanjiChar, Quiz, QuizAnswer, QuizAnswerId, QuizKind,
    Snippet, Source, SourceGroup, SourceId,
};
use crate::statistics::{KanjiSet, QuizChunkHistoryEntry, QuizSourceStats};

// ---------------------------------------------------------------------------
// Quiz generation
// ---------------------------------------------------------------------------

/// Builds a complete quiz for a start criterion.
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    /// Generate the questions for `kind`.
    ///
    /// Fails with [`QuizError::Generation`](crate::error::QuizError::Generation)
    /// when the criterion resolves to zero eligible kanji.
    async fn generate_quiz(&self, kind: &QuizKind) -> Result<Quiz>;
}

// ---------------------------------------------------------------------------
// Answer and bookmark recording
// ---------------------------------------------------------------------------

/// Persists answers and bookmarks.
///
/// None of these calls are assumed to be idempotent; callers never retry.
#[async_trait]
pub trait AnswerRecorder: Send + Sync {
    /// Append an answer to the answer log.
    async fn record_answer(
        &self,
        question: KanjiChar,
        answer: KanjiChar,
        source: Option<SourceId>,
    ) -> Result<QuizAnswerId>;

    /// Save `snippet` as a bookmark.
    async fn create_bookmark(&self, snippet: &Snippet) -> Result<BookmarkId>;

    /// Delete a bookmark, returning the number of affected rows.
    async fn remove_bookmark(&self, id: BookmarkId) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Statistics reads
// ---------------------------------------------------------------------------

/// Read-only snapshots of statistics and catalog data.
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Aggregate set with per-chunk quiz accuracy.
    async fn get_set(&self) -> Result<KanjiSet>;

    /// Frequency entries of every known kanji.
    async fn search_kanji(&self) -> Result<Vec<Frequency>>;

    async fn list_sources(&self) -> Result<Vec<Source>>;

    async fn list_source_groups(&self) -> Result<Vec<SourceGroup>>;

    /// The answer log, newest first.
    async fn get_quiz_answers(&self) -> Result<Vec<QuizAnswer>>;

    async fn get_bookmarks(&self) -> Result<Vec<Bookmark>>;

    /// Stats of every source quizzed at least once, most-quizzed first.
    async fn get_quiz_source_stats(&self) -> Result<Vec<QuizSourceStats>>;

    async fn get_quiz_chunk_history(&self) -> Result<Vec<QuizChunkHistoryEntry>>;
}
