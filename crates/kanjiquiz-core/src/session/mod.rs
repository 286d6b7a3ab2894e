//! Quiz session state machine.
//!
//! A [`QuizSession`] runs one quiz at a time:
//!
//! ```text
//! Idle -> Loading -> Active <-> Answering
//!   ^                  |
//!   +---- leave() -----+
//! ```
//!
//! Mutating operations (`start`, `answer`, bookmark changes) are serialized
//! by a session-wide async lock. Getters never take that lock: they read a
//! snapshot of the visible state, which is only written after each store
//! call has resolved, one write section per transition. Observer callbacks
//! run after that section ends.

mod bookmark;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{BookmarkId, KanjiChar, Quiz, QuizKind, QuizQuestion, Snippet, SnippetId};
use crate::statistics::KanjiSet;
use crate::traits::{AnswerRecorder, QuizGenerator, StatisticsStore};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Active,
    Answering,
}

/// 1-based position of the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub index: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}

/// State-change callbacks for hosts that render the session.
pub trait SessionObserver: Send + Sync {
    fn on_question(&self, question: &QuizQuestion, progress: Progress);
    fn on_answer(&self, question: &QuizQuestion, chosen: KanjiChar, correct: bool);
    fn on_leave(&self);
}

/// No-op session observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_question(&self, _: &QuizQuestion, _: Progress) {}
    fn on_answer(&self, _: &QuizQuestion, _: KanjiChar, _: bool) {}
    fn on_leave(&self) {}
}

#[derive(Debug, Default)]
struct SessionState {
    status: SessionStatus,
    /// Unanswered questions, the current one included.
    pending: Vec<QuizQuestion>,
    total: usize,
    current: Option<QuizQuestion>,
    chosen: Option<KanjiChar>,
    can_answer: bool,
}

impl SessionState {
    fn progress(&self) -> Option<Progress> {
        self.current.as_ref().map(|_| Progress {
            index: self.total - self.pending.len() + 1,
            total: self.total,
        })
    }

    /// Make the first pending question current.
    ///
    /// Returns `None` when nothing is pending; the state is then untouched.
    fn show_next(&mut self) -> Option<(QuizQuestion, Progress)> {
        let question = self.pending.first().cloned()?;
        self.current = Some(question.clone());
        self.chosen = None;
        self.can_answer = true;
        self.status = SessionStatus::Active;
        self.progress().map(|progress| (question, progress))
    }

    /// Drop the question with `snippet` from the pending list.
    fn complete(&mut self, snippet: SnippetId) {
        if let Some(pos) = self.pending.iter().position(|q| q.snippet.id == snippet) {
            self.pending.remove(pos);
        }
    }

    /// Set the bookmark of the current snippet if it is still `snippet`.
    fn set_bookmark(&mut self, snippet: SnippetId, bookmark: Option<BookmarkId>) -> bool {
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        if current.snippet.id != snippet {
            return false;
        }

        current.snippet.bookmark = bookmark;
        for question in self.pending.iter_mut().filter(|q| q.snippet.id == snippet) {
            question.snippet.bookmark = bookmark;
        }
        true
    }
}

/// A single quiz session over injected collaborators.
pub struct QuizSession {
    id: Uuid,
    generator: Arc<dyn QuizGenerator>,
    recorder: Arc<dyn AnswerRecorder>,
    store: Arc<dyn StatisticsStore>,
    observer: Arc<dyn SessionObserver>,
    lock: Mutex<()>,
    state: RwLock<SessionState>,
    generation: AtomicU64,
    set: RwLock<Option<KanjiSet>>,
    set_loads: AtomicUsize,
}

impl QuizSession {
    pub fn new(
        generator: Arc<dyn QuizGenerator>,
        recorder: Arc<dyn AnswerRecorder>,
        store: Arc<dyn StatisticsStore>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generator,
            recorder,
            store,
            observer: Arc::new(NoopObserver),
            lock: Mutex::new(()),
            state: RwLock::new(SessionState::default()),
            generation: AtomicU64::new(0),
            set: RwLock::new(None),
            set_loads: AtomicUsize::new(0),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    // -----------------------------------------------------------------------
    // Getters
    // -----------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.state().status
    }

    /// `true` while a quiz is running (loaded and not yet left).
    pub fn is_active(&self) -> bool {
        matches!(self.status(), SessionStatus::Active | SessionStatus::Answering)
    }

    pub fn current(&self) -> Option<QuizQuestion> {
        self.state().current.clone()
    }

    pub fn snippet(&self) -> Option<Snippet> {
        self.state().current.as_ref().map(|q| q.snippet.clone())
    }

    pub fn bookmark(&self) -> Option<BookmarkId> {
        self.state().current.as_ref().and_then(|q| q.snippet.bookmark)
    }

    /// The option chosen for the current question, if any.
    pub fn chosen(&self) -> Option<KanjiChar> {
        self.state().chosen
    }

    pub fn can_answer(&self) -> bool {
        self.state().can_answer
    }

    pub fn progress(&self) -> Option<Progress> {
        self.state().progress()
    }

    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    /// Latest aggregate set snapshot, refreshed on every `leave()`.
    pub fn set(&self) -> Option<KanjiSet> {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `true` while a mutating operation or a set refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.lock.try_lock().is_err() || self.set_loads.load(Ordering::SeqCst) > 0
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Start a new quiz built from `kind`.
    ///
    /// Does nothing if a quiz is already loading or running. On failure the
    /// session is back to `Idle` and the error is returned.
    pub async fn start(&self, kind: QuizKind) -> Result<()> {
        if self.status() != SessionStatus::Idle {
            tracing::debug!(session = %self.id, "start ignored, a quiz is already running");
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let generation = {
            let mut state = self.state_mut();
            if state.status != SessionStatus::Idle {
                tracing::debug!(session = %self.id, "start ignored, a quiz is already running");
                return Ok(());
            }
            state.status = SessionStatus::Loading;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        tracing::info!(session = %self.id, generation, "starting quiz from {kind}");
        let result = self.generator.generate_quiz(&kind).await;

        let shown = {
            let mut state = self.state_mut();
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::warn!(
                    session = %self.id,
                    generation,
                    "discarding quiz from an abandoned start"
                );
                return Ok(());
            }

            match result {
                Ok(quiz) => {
                    let questions = Quiz::new(quiz.into_questions()).into_questions();
                    state.total = questions.len();
                    state.pending = questions;
                    self.advance(&mut state)
                }
                Err(err) => {
                    *state = SessionState::default();
                    return Err(err);
                }
            }
        };

        self.announce(shown).await
    }

    /// Show the next pending question, or reset to `Idle` when none are left.
    ///
    /// Called with the state write guard held, in the same section as the
    /// mutation that precedes it.
    fn advance(&self, state: &mut SessionState) -> Option<(QuizQuestion, Progress)> {
        let shown = state.show_next();
        if shown.is_none() {
            self.reset(state);
        }
        shown
    }

    /// Notify the observer of the outcome of [`advance`](Self::advance).
    async fn announce(&self, shown: Option<(QuizQuestion, Progress)>) -> Result<()> {
        match shown {
            Some((question, progress)) => {
                tracing::debug!(
                    session = %self.id,
                    %progress,
                    answer = %question.answer,
                    "next question"
                );
                self.observer.on_question(&question, progress);
                Ok(())
            }
            None => self.after_leave().await,
        }
    }

    /// Answer the current question with `chosen`.
    ///
    /// Ignored unless a question is shown and answering is enabled.
    /// Answering is disabled before the answer is recorded; if recording
    /// fails the error is returned and the session stays in `Answering`
    /// until [`leave`](Self::leave) is called. Answers are never retried.
    pub async fn answer(&self, chosen: KanjiChar) -> Result<()> {
        if !self.can_answer() {
            tracing::debug!(session = %self.id, "answer ignored, answering is disabled");
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let (question, generation) = {
            let mut state = self.state_mut();
            if state.status != SessionStatus::Active || !state.can_answer {
                return Ok(());
            }
            let Some(question) = state.current.clone() else {
                return Ok(());
            };

            state.can_answer = false;
            state.chosen = Some(chosen);
            state.status = SessionStatus::Answering;
            (question, self.generation.load(Ordering::SeqCst))
        };

        self.recorder
            .record_answer(question.answer, chosen, Some(question.snippet.source.id))
            .await?;

        let shown = {
            let mut state = self.state_mut();
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::warn!(session = %self.id, "answer recorded after the quiz was left");
                return Ok(());
            }
            state.complete(question.snippet.id);
            self.advance(&mut state)
        };

        let correct = question.is_correct(chosen);
        tracing::debug!(
            session = %self.id,
            answer = %question.answer,
            %chosen,
            correct,
            "answer recorded"
        );
        self.observer.on_answer(&question, chosen, correct);

        self.announce(shown).await
    }

    /// Abandon or finish the quiz and refresh the aggregate set.
    ///
    /// Safe to call at any time; it does not wait for in-flight operations,
    /// whose results are discarded when they arrive.
    pub async fn leave(&self) -> Result<()> {
        self.reset(&mut self.state_mut());
        self.after_leave().await
    }

    /// Invalidate in-flight operations and clear the visible state.
    fn reset(&self, state: &mut SessionState) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = SessionState::default();
    }

    async fn after_leave(&self) -> Result<()> {
        tracing::info!(session = %self.id, "left quiz");
        self.observer.on_leave();
        self.load_set().await
    }

    /// Fetch a fresh aggregate set snapshot.
    pub async fn load_set(&self) -> Result<()> {
        self.set_loads.fetch_add(1, Ordering::SeqCst);
        let result = self.store.get_set().await;
        self.set_loads.fetch_sub(1, Ordering::SeqCst);

        let set = result?;
        *self.set.write().unwrap_or_else(PoisonError::into_inner) = Some(set);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("QuizSession")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("pending", &state.pending.len())
            .field("progress", &state.progress())
            .finish()
    }
}
