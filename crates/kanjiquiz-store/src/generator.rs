//! Quiz generation over an in-memory catalog.
//!
//! A [`QuizKind`] is first resolved to a list of kanji and the sources
//! their snippets may come from. Each unique kanji then gets one snippet,
//! picked by source weight among the lines that contain it, and a set of
//! distractor options drawn from every known kanji.

use std::collections::HashSet;

use rand::prelude::*;

use kanjiquiz_core::error::{QuizError, Result};
use kanjiquiz_core::model::{
    is_kanji, KanjiChar, Quiz, QuizKind, QuizQuestion, Snippet, SnippetId, SnippetSource, Source,
    SourceGroupId, SourceId,
};
use kanjiquiz_core::sampler::SourceSampler;

use crate::config::Settings;
use crate::error::StoreError;
use crate::memory::StoreState;

/// Kanji to quiz and the sources to draw their snippets from.
type Resolved = (Vec<KanjiChar>, Vec<Source>);

/// Builds quizzes and snippet lists from one consistent view of the store.
pub(crate) struct QuizBuilder<'a> {
    settings: &'a Settings,
    state: &'a StoreState,
    sampler: SourceSampler,
}

impl<'a> QuizBuilder<'a> {
    pub(crate) fn new(settings: &'a Settings, state: &'a StoreState) -> Self {
        Self {
            settings,
            state,
            sampler: SourceSampler::new(settings.ignore_source_weight),
        }
    }

    /// Generate a shuffled quiz for `kind`.
    pub(crate) fn generate<R: Rng + ?Sized>(&self, kind: &QuizKind, rng: &mut R) -> Result<Quiz> {
        let (kanjis, sources) = self.resolve(kind, rng)?;
        let universe = self.state.universe();

        let mut seen = HashSet::new();
        let mut questions = Vec::new();
        for kanji in kanjis.into_iter().filter(|k| seen.insert(*k)) {
            let candidates = self.candidates(kanji, &sources);
            let Some(snippet) = self
                .sampler
                .pick_item(&candidates, |s| s.source.id, &sources, rng)
            else {
                tracing::trace!(%kanji, "no snippet, skipping");
                continue;
            };

            let options = self.options(kanji, &universe, rng);
            questions.push(QuizQuestion::new(snippet.clone(), kanji, options));
        }

        if questions.is_empty() {
            return Err(QuizError::generation(format!("no questions could be built from {kind}")));
        }

        questions.shuffle(rng);
        tracing::debug!(questions = questions.len(), "generated quiz from {kind}");
        Ok(Quiz::new(questions))
    }

    /// Up to `snippet_limit` snippets containing `kanji`, from `source` or
    /// from every enabled source.
    pub(crate) fn search_snippets<R: Rng + ?Sized>(
        &self,
        kanji: KanjiChar,
        source: Option<SourceId>,
        rng: &mut R,
    ) -> Result<Vec<Snippet>> {
        let sources = match source {
            Some(id) => self.explicit_sources(&[id])?,
            None => self.state.enabled_sources(),
        };

        let candidates = self.candidates(kanji, &sources);
        let chosen: HashSet<SnippetId> = self
            .sampler
            .choose_weighted(
                &candidates,
                self.settings.snippet_limit,
                |s| s.source.id,
                &sources,
                rng,
            )
            .into_iter()
            .map(|s| s.id)
            .collect();

        let mut snippets: Vec<Snippet> = candidates
            .into_iter()
            .filter(|s| chosen.contains(&s.id))
            .collect();

        if self.settings.shuffle_snippets {
            snippets.shuffle(rng);
        }

        Ok(snippets)
    }

    // -----------------------------------------------------------------------
    // Criterion resolution
    // -----------------------------------------------------------------------

    fn resolve<R: Rng + ?Sized>(&self, kind: &QuizKind, rng: &mut R) -> Result<Resolved> {
        match kind {
            QuizKind::Chunk { chunk } => Ok((chunk.clone(), self.state.enabled_sources())),
            QuizKind::RandomChunk => {
                let kanjis = self
                    .state
                    .universe()
                    .choose_multiple(rng, self.settings.set_chunk_size)
                    .copied()
                    .collect();
                Ok((kanjis, self.state.enabled_sources()))
            }
            QuizKind::Source { ids } => self.from_sources(ids, rng),
            QuizKind::RandomSource => {
                let sources: Vec<Source> =
                    self.state.sources.values().map(|e| e.source.clone()).collect();
                let id = self
                    .sampler
                    .pick(&sources, rng)
                    .ok_or_else(|| QuizError::generation("no enabled source"))?;
                self.from_sources(&[id], rng)
            }
            QuizKind::SourceGroup { ids } => self.from_groups(ids, rng),
            QuizKind::RandomSourceGroup => {
                let ids: Vec<SourceGroupId> = self.state.groups.keys().copied().collect();
                let id = ids
                    .choose(rng)
                    .copied()
                    .ok_or_else(|| QuizError::generation("no source group"))?;
                self.from_groups(&[id], rng)
            }
            QuizKind::Url { urls } => {
                let mut seen = HashSet::new();
                let mut kanjis = Vec::new();
                for url in urls.iter().filter(|u| seen.insert(u.as_str())) {
                    match self.state.pages.get(url) {
                        Some(text) => kanjis.extend(KanjiChar::extract(text)),
                        None => tracing::warn!(%url, "no page registered for url"),
                    }
                }
                Ok((kanjis, self.state.enabled_sources()))
            }
        }
    }

    /// Kanji of the snippet lines of `ids`, up to `set_chunk_size` of them
    /// at random.
    fn from_sources<R: Rng + ?Sized>(&self, ids: &[SourceId], rng: &mut R) -> Result<Resolved> {
        let sources = self.explicit_sources(ids)?;

        let mut seen = HashSet::new();
        let kanjis: Vec<KanjiChar> = sources
            .iter()
            .filter_map(|s| self.state.sources.get(&s.id))
            .flat_map(|entry| entry.lines.iter())
            .filter(|line| self.is_snippet(line))
            .flat_map(|line| KanjiChar::extract(line))
            .filter(|k| seen.insert(*k))
            .collect();

        let chosen = kanjis
            .choose_multiple(rng, self.settings.set_chunk_size)
            .copied()
            .collect();
        Ok((chosen, sources))
    }

    fn from_groups<R: Rng + ?Sized>(&self, ids: &[SourceGroupId], rng: &mut R) -> Result<Resolved> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for id in ids {
            let group = self
                .state
                .groups
                .get(id)
                .ok_or(StoreError::SourceGroupNotFound(*id))?;
            sources.extend(group.sources.iter().copied().filter(|s| seen.insert(*s)));
        }

        self.from_sources(&sources, rng)
    }

    /// Explicitly requested sources take part even when disabled.
    fn explicit_sources(&self, ids: &[SourceId]) -> Result<Vec<Source>> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for id in ids.iter().filter(|id| seen.insert(**id)) {
            let entry = self
                .state
                .sources
                .get(id)
                .ok_or(StoreError::SourceNotFound(*id))?;
            sources.push(Source {
                enabled: true,
                ..entry.source.clone()
            });
        }
        Ok(sources)
    }

    // -----------------------------------------------------------------------
    // Snippets and options
    // -----------------------------------------------------------------------

    /// Lines of `sources` containing `kanji`, unique by content.
    fn candidates(&self, kanji: KanjiChar, sources: &[Source]) -> Vec<Snippet> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut snippets = Vec::new();

        for source in sources {
            let Some(entry) = self.state.sources.get(&source.id) else {
                continue;
            };

            for (index, line) in entry.lines.iter().enumerate() {
                if !line.contains(kanji.as_char()) || !self.is_snippet(line) {
                    continue;
                }
                if !seen.insert(line.as_str()) {
                    continue;
                }

                snippets.push(Snippet {
                    id: SnippetId::next(),
                    content: line.clone(),
                    source: SnippetSource {
                        id: source.id,
                        name: source.name.clone(),
                        path: source.path.clone(),
                        line: index + 1,
                    },
                    bookmark: self.state.bookmark_for(line, source.id),
                });
            }
        }

        snippets
    }

    /// Markup and comment lines never become snippets, nor do lines with
    /// fewer than `snippet_min_len` kanji.
    fn is_snippet(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') || trimmed.starts_with('<') {
            return false;
        }
        line.chars().filter(|c| is_kanji(*c)).count() >= self.settings.snippet_min_len
    }

    /// The answer plus up to `option_count - 1` distinct distractors, shuffled.
    fn options<R: Rng + ?Sized>(
        &self,
        answer: KanjiChar,
        universe: &[KanjiChar],
        rng: &mut R,
    ) -> Vec<KanjiChar> {
        let mut options = universe
            .iter()
            .filter(|k| **k != answer)
            .copied()
            .choose_multiple(rng, self.settings.option_count.saturating_sub(1));

        options.push(answer);
        options.shuffle(rng);
        options
    }
}
