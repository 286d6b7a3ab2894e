//! Mock store for testing.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::model::{
    Bookmark, BookmarkId, Frequency, KanjiChar, Quiz, QuizAnswer, QuizAnswerId, QuizKind, Snippet,
    Source, SourceGroup, SourceId,
};
use kanjiquiz_core::statistics::{KanjiSet, QuizChunkHistoryEntry, QuizSourceStats};
use kanjiquiz_core::traits::{AnswerRecorder, QuizGenerator, StatisticsStore};

/// An answer as the mock received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub question: KanjiChar,
    pub answer: KanjiChar,
    pub source: Option<SourceId>,
}

/// A scriptable store for driving a session without real data.
///
/// Every call yields to the runtime once before answering, like a store
/// behind I/O would.
pub struct MockStore {
    quiz: Mutex<Quiz>,
    set: Mutex<KanjiSet>,
    fail_generation: AtomicBool,
    fail_record: AtomicBool,
    /// Rows `remove_bookmark` reports.
    removed_rows: AtomicUsize,
    /// Holds `generate_quiz` until released, when set.
    gate: Option<Semaphore>,
    generation_entered: Notify,
    next_answer: AtomicU64,
    next_bookmark: AtomicI64,
    generate_calls: AtomicU32,
    record_calls: AtomicU32,
    create_bookmark_calls: AtomicU32,
    remove_bookmark_calls: AtomicU32,
    get_set_calls: AtomicU32,
    recorded: Mutex<Vec<RecordedAnswer>>,
    last_kind: Mutex<Option<QuizKind>>,
}

impl MockStore {
    /// Create a mock that generates `quiz` on every start.
    pub fn new(quiz: Quiz) -> Self {
        Self {
            quiz: Mutex::new(quiz),
            set: Mutex::new(KanjiSet::default()),
            fail_generation: AtomicBool::new(false),
            fail_record: AtomicBool::new(false),
            removed_rows: AtomicUsize::new(1),
            gate: None,
            generation_entered: Notify::new(),
            next_answer: AtomicU64::new(0),
            next_bookmark: AtomicI64::new(0),
            generate_calls: AtomicU32::new(0),
            record_calls: AtomicU32::new(0),
            create_bookmark_calls: AtomicU32::new(0),
            remove_bookmark_calls: AtomicU32::new(0),
            get_set_calls: AtomicU32::new(0),
            recorded: Mutex::new(Vec::new()),
            last_kind: Mutex::new(None),
        }
    }

    /// Make `generate_quiz` wait for [`release_generation`](Self::release_generation).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let one held `generate_quiz` call finish.
    pub fn release_generation(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Resolves once a `generate_quiz` call has started.
    pub async fn generation_started(&self) {
        self.generation_entered.notified().await;
    }

    pub fn set_quiz(&self, quiz: Quiz) {
        *lock(&self.quiz) = quiz;
    }

    pub fn set_set(&self, set: KanjiSet) {
        *lock(&self.set) = set;
    }

    pub fn fail_generation(&self, fail: bool) {
        self.fail_generation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_record(&self, fail: bool) {
        self.fail_record.store(fail, Ordering::SeqCst);
    }

    pub fn set_removed_rows(&self, rows: usize) {
        self.removed_rows.store(rows, Ordering::SeqCst);
    }

    pub fn generate_calls(&self) -> u32 {
        self.generate_calls.load(Ordering::Relaxed)
    }

    pub fn record_calls(&self) -> u32 {
        self.record_calls.load(Ordering::Relaxed)
    }

    pub fn create_bookmark_calls(&self) -> u32 {
        self.create_bookmark_calls.load(Ordering::Relaxed)
    }

    pub fn remove_bookmark_calls(&self) -> u32 {
        self.remove_bookmark_calls.load(Ordering::Relaxed)
    }

    pub fn get_set_calls(&self) -> u32 {
        self.get_set_calls.load(Ordering::Relaxed)
    }

    /// Answers recorded so far, oldest first.
    pub fn recorded(&self) -> Vec<RecordedAnswer> {
        lock(&self.recorded).clone()
    }

    /// The criterion of the last `generate_quiz` call.
    pub fn last_kind(&self) -> Option<QuizKind> {
        lock(&self.last_kind).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl QuizGenerator for MockStore {
    async fn generate_quiz(&self, kind: &QuizKind) -> Result<Quiz> {
        self.generate_calls.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_kind) = Some(kind.clone());
        self.generation_entered.notify_one();

        match &self.gate {
            Some(gate) => {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| QuizError::transport(e.to_string()))?;
                permit.forget();
            }
            None => tokio::task::yield_now().await,
        }

        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(QuizError::generation("mock generation failure"));
        }
        Ok(lock(&self.quiz).clone())
    }
}

#[async_trait]
impl AnswerRecorder for MockStore {
    async fn record_answer(
        &self,
        question: KanjiChar,
        answer: KanjiChar,
        source: Option<SourceId>,
    ) -> Result<QuizAnswerId> {
        self.record_calls.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;

        if self.fail_record.load(Ordering::SeqCst) {
            return Err(QuizError::record("mock record failure"));
        }

        lock(&self.recorded).push(RecordedAnswer {
            question,
            answer,
            source,
        });
        Ok(QuizAnswerId(self.next_answer.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn create_bookmark(&self, _snippet: &Snippet) -> Result<BookmarkId> {
        self.create_bookmark_calls.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;

        if self.fail_record.load(Ordering::SeqCst) {
            return Err(QuizError::record("mock bookmark failure"));
        }
        Ok(BookmarkId(self.next_bookmark.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn remove_bookmark(&self, _id: BookmarkId) -> Result<usize> {
        self.remove_bookmark_calls.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;

        if self.fail_record.load(Ordering::SeqCst) {
            return Err(QuizError::record("mock bookmark failure"));
        }
        Ok(self.removed_rows.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl StatisticsStore for MockStore {
    async fn get_set(&self) -> Result<KanjiSet> {
        self.get_set_calls.fetch_add(1, Ordering::Relaxed);
        Ok(lock(&self.set).clone())
    }

    async fn search_kanji(&self) -> Result<Vec<Frequency>> {
        Ok(Vec::new())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(Vec::new())
    }

    async fn list_source_groups(&self) -> Result<Vec<SourceGroup>> {
        Ok(Vec::new())
    }

    async fn get_quiz_answers(&self) -> Result<Vec<QuizAnswer>> {
        Ok(Vec::new())
    }

    async fn get_bookmarks(&self) -> Result<Vec<Bookmark>> {
        Ok(Vec::new())
    }

    async fn get_quiz_source_stats(&self) -> Result<Vec<QuizSourceStats>> {
        Ok(Vec::new())
    }

    async fn get_quiz_chunk_history(&self) -> Result<Vec<QuizChunkHistoryEntry>> {
        Ok(Vec::new())
    }
}
