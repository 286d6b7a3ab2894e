//! In-memory statistics store.
//!
//! [`MemoryStore`] implements every collaborator trait of the engine over
//! plain collections guarded by a `RwLock`. Data lives as long as the store
//! does. All reads hand out owned snapshots.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use kanjiquiz_core::error::Result;
use kanjiquiz_core::model::{
    Bookmark, BookmarkId, Frequency, KanjiChar, KanjiSetChunkId, Quiz, QuizAnswer, QuizAnswerId,
    QuizKind, Snippet, Source, SourceGroup, SourceGroupId, SourceId, SourceWeight,
};
use kanjiquiz_core::statistics::{
    compute_source_stats, tally_frequencies, KanjiSet, QuizChunkHistoryEntry, QuizSourceStats,
};
use kanjiquiz_core::traits::{AnswerRecorder, QuizGenerator, StatisticsStore};

use crate::config::Settings;
use crate::error::StoreError;
use crate::generator::QuizBuilder;

type StoreResult<T> = std::result::Result<T, StoreError>;

/// A source and its text, one entry per line.
#[derive(Debug, Clone)]
pub(crate) struct SourceEntry {
    pub(crate) source: Source,
    pub(crate) lines: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) sources: BTreeMap<SourceId, SourceEntry>,
    pub(crate) groups: BTreeMap<SourceGroupId, SourceGroup>,
    pub(crate) pages: HashMap<String, String>,
    /// Oldest first.
    answers: Vec<QuizAnswer>,
    bookmarks: BTreeMap<BookmarkId, Bookmark>,
    chunk_history: BTreeMap<KanjiSetChunkId, DateTime<Utc>>,
    next_source: u32,
    next_group: u32,
    next_bookmark: i64,
    next_answer: u64,
}

impl StoreState {
    pub(crate) fn enabled_sources(&self) -> Vec<Source> {
        self.sources
            .values()
            .filter(|e| e.source.enabled)
            .map(|e| e.source.clone())
            .collect()
    }

    /// Every kanji of every source text, in order of first appearance.
    pub(crate) fn universe(&self) -> Vec<KanjiChar> {
        let mut seen = HashSet::new();
        self.sources
            .values()
            .flat_map(|e| e.lines.iter())
            .flat_map(|line| KanjiChar::extract(line))
            .filter(|k| seen.insert(*k))
            .collect()
    }

    pub(crate) fn bookmark_for(&self, content: &str, source: SourceId) -> Option<BookmarkId> {
        self.bookmarks
            .values()
            .find(|b| b.source_id == source && b.snippet == content)
            .map(|b| b.id)
    }

    fn frequencies(&self) -> Vec<Frequency> {
        tally_frequencies(self.sources.values().flat_map(|e| {
            e.lines
                .iter()
                .map(move |line| (e.source.name.as_str(), line.as_str()))
        }))
    }

    fn set(&self, chunk_size: usize) -> KanjiSet {
        KanjiSet::build(&self.frequencies(), chunk_size, &self.answers)
    }

    fn source_mut(&mut self, id: SourceId) -> StoreResult<&mut SourceEntry> {
        self.sources.get_mut(&id).ok_or(StoreError::SourceNotFound(id))
    }

    fn group_mut(&mut self, id: SourceGroupId) -> StoreResult<&mut SourceGroup> {
        self.groups.get_mut(&id).ok_or(StoreError::SourceGroupNotFound(id))
    }
}

/// In-memory store, quiz generator, and answer recorder.
pub struct MemoryStore {
    settings: Settings,
    state: RwLock<StoreState>,
    rng: Mutex<StdRng>,
}

impl MemoryStore {
    /// Create an empty store with an entropy-seeded random source.
    ///
    /// Fails if `settings` do not pass [`Settings::validate`].
    pub fn new(settings: Settings) -> StoreResult<Self> {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Create an empty store whose random choices are reproducible.
    pub fn with_seed(settings: Settings, seed: u64) -> StoreResult<Self> {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: Settings, rng: StdRng) -> StoreResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state: RwLock::new(StoreState::default()),
            rng: Mutex::new(rng),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    /// Register an enabled source with the default weight.
    pub fn add_source(&self, name: impl Into<String>, path: impl Into<String>) -> SourceId {
        let mut state = self.write();
        state.next_source += 1;
        let id = SourceId(state.next_source);

        let source = Source {
            id,
            name: name.into(),
            path: path.into(),
            enabled: true,
            weight: SourceWeight::default(),
        };
        tracing::debug!(source = %id, name = %source.name, "added source");
        state.sources.insert(
            id,
            SourceEntry {
                source,
                lines: Vec::new(),
            },
        );
        id
    }

    /// Append `text` to a source, returning the number of lines added.
    pub fn add_text(&self, id: SourceId, text: &str) -> StoreResult<usize> {
        let mut state = self.write();
        let entry = state.source_mut(id)?;
        let before = entry.lines.len();
        entry.lines.extend(text.lines().map(str::to_string));
        Ok(entry.lines.len() - before)
    }

    /// Flip a source's enabled flag, returning the new value.
    pub fn toggle_source(&self, id: SourceId) -> StoreResult<bool> {
        let mut state = self.write();
        let source = &mut state.source_mut(id)?.source;
        source.enabled = !source.enabled;
        Ok(source.enabled)
    }

    /// Set a source's weight, clamped to the valid range.
    pub fn set_source_weight(&self, id: SourceId, weight: u8) -> StoreResult<SourceWeight> {
        let mut state = self.write();
        let source = &mut state.source_mut(id)?.source;
        source.weight = SourceWeight::new(weight);
        Ok(source.weight)
    }

    pub fn rename_source(&self, id: SourceId, name: impl Into<String>) -> StoreResult<()> {
        self.write().source_mut(id)?.source.name = name.into();
        Ok(())
    }

    /// Remove a source and its membership in every group.
    pub fn remove_source(&self, id: SourceId) -> StoreResult<Source> {
        let mut state = self.write();
        let entry = state.sources.remove(&id).ok_or(StoreError::SourceNotFound(id))?;
        for group in state.groups.values_mut() {
            group.sources.remove(&id);
        }
        Ok(entry.source)
    }

    // -----------------------------------------------------------------------
    // Source groups
    // -----------------------------------------------------------------------

    pub fn create_source_group(&self, name: impl Into<String>) -> SourceGroupId {
        let mut state = self.write();
        state.next_group += 1;
        let id = SourceGroupId(state.next_group);
        state.groups.insert(
            id,
            SourceGroup {
                id,
                name: name.into(),
                sources: Default::default(),
            },
        );
        id
    }

    pub fn rename_source_group(
        &self,
        id: SourceGroupId,
        name: impl Into<String>,
    ) -> StoreResult<()> {
        self.write().group_mut(id)?.name = name.into();
        Ok(())
    }

    /// Replace a group's sources. Duplicates collapse; unknown sources are
    /// rejected and leave the group untouched.
    pub fn set_source_group_sources(
        &self,
        id: SourceGroupId,
        sources: &[SourceId],
    ) -> StoreResult<()> {
        let mut state = self.write();
        if let Some(missing) = sources.iter().find(|s| !state.sources.contains_key(*s)) {
            return Err(StoreError::SourceNotFound(*missing));
        }
        state.group_mut(id)?.sources = sources.iter().copied().collect();
        Ok(())
    }

    pub fn remove_source_group(&self, id: SourceGroupId) -> StoreResult<SourceGroup> {
        self.write()
            .groups
            .remove(&id)
            .ok_or(StoreError::SourceGroupNotFound(id))
    }

    // -----------------------------------------------------------------------
    // Pages, snippets, history
    // -----------------------------------------------------------------------

    /// Register the text behind a url for url quizzes.
    pub fn add_page(&self, url: impl Into<String>, text: impl Into<String>) {
        self.write().pages.insert(url.into(), text.into());
    }

    /// Snippets of `kanji`, from one source or from every enabled source.
    pub fn search_snippets(
        &self,
        kanji: KanjiChar,
        source: Option<SourceId>,
    ) -> Result<Vec<Snippet>> {
        let state = self.read();
        let mut rng = self.rng();
        QuizBuilder::new(&self.settings, &state).search_snippets(kanji, source, &mut *rng)
    }

    /// Forget when every chunk was last quizzed, returning how many entries
    /// were removed.
    pub fn clear_quiz_chunk_history(&self) -> usize {
        let mut state = self.write();
        let removed = state.chunk_history.len();
        state.chunk_history.clear();
        removed
    }

    // -----------------------------------------------------------------------
    // Locks
    // -----------------------------------------------------------------------

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Settings::default()).expect("default settings are valid")
    }
}

#[async_trait]
impl QuizGenerator for MemoryStore {
    async fn generate_quiz(&self, kind: &QuizKind) -> Result<Quiz> {
        let quiz = {
            let state = self.read();
            let mut rng = self.rng();
            QuizBuilder::new(&self.settings, &state).generate(kind, &mut *rng)?
        };

        if let QuizKind::Chunk { chunk } = kind {
            let mut state = self.write();
            let matched = state.set(self.settings.set_chunk_size).find_chunk(chunk);
            if let Some(id) = matched {
                state.chunk_history.insert(id, Utc::now());
                tracing::debug!(chunk = %id, "recorded chunk quiz");
            }
        }

        Ok(quiz)
    }
}

#[async_trait]
impl AnswerRecorder for MemoryStore {
    async fn record_answer(
        &self,
        question: KanjiChar,
        answer: KanjiChar,
        source: Option<SourceId>,
    ) -> Result<QuizAnswerId> {
        let mut state = self.write();
        state.next_answer += 1;
        let id = QuizAnswerId(state.next_answer);
        state.answers.push(QuizAnswer {
            id,
            question,
            answer,
            source_id: source,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn create_bookmark(&self, snippet: &Snippet) -> Result<BookmarkId> {
        let mut state = self.write();
        state.next_bookmark += 1;
        let id = BookmarkId(state.next_bookmark);
        state.bookmarks.insert(
            id,
            Bookmark {
                id,
                snippet: snippet.content.clone(),
                source_id: snippet.source.id,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn remove_bookmark(&self, id: BookmarkId) -> Result<usize> {
        Ok(usize::from(self.write().bookmarks.remove(&id).is_some()))
    }
}

#[async_trait]
impl StatisticsStore for MemoryStore {
    async fn get_set(&self) -> Result<KanjiSet> {
        Ok(self.read().set(self.settings.set_chunk_size))
    }

    async fn search_kanji(&self) -> Result<Vec<Frequency>> {
        Ok(self.read().frequencies())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.read().sources.values().map(|e| e.source.clone()).collect())
    }

    async fn list_source_groups(&self) -> Result<Vec<SourceGroup>> {
        Ok(self.read().groups.values().cloned().collect())
    }

    async fn get_quiz_answers(&self) -> Result<Vec<QuizAnswer>> {
        Ok(self.read().answers.iter().rev().cloned().collect())
    }

    async fn get_bookmarks(&self) -> Result<Vec<Bookmark>> {
        Ok(self.read().bookmarks.values().rev().cloned().collect())
    }

    async fn get_quiz_source_stats(&self) -> Result<Vec<QuizSourceStats>> {
        let state = self.read();
        let ids: Vec<SourceId> = state.sources.keys().copied().collect();
        Ok(compute_source_stats(&ids, &state.answers))
    }

    async fn get_quiz_chunk_history(&self) -> Result<Vec<QuizChunkHistoryEntry>> {
        Ok(self
            .read()
            .chunk_history
            .iter()
            .map(|(id, last_quiz)| QuizChunkHistoryEntry {
                id: *id,
                last_quiz: *last_quiz,
            })
            .collect())
    }
}
