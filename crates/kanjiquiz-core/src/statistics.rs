//! Frequency tallies and answer-accuracy aggregates.
//!
//! Stores call into these helpers to turn raw text and the append-only
//! answer log into the snapshots the engine reads. Nothing here mutates
//! store state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    Frequency, KanjiChar, KanjiSetChunkId, Level, QuizAnswer, SourceFrequency, SourceId,
};

/// `correct / quizzes`, or `None` when nothing was quizzed.
pub fn accuracy(correct: u64, quizzes: u64) -> Option<f64> {
    (quizzes > 0).then(|| correct as f64 / quizzes as f64)
}

/// Count kanji occurrences across `(source name, text)` pairs.
///
/// Entries come out in order of first appearance. Ratios and levels are
/// computed against the total number of kanji seen; with no kanji at all
/// every level stays [`Level::Unknown`].
pub fn tally_frequencies<'a, I>(texts: I) -> Vec<Frequency>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut index: HashMap<KanjiChar, usize> = HashMap::new();
    let mut frequencies: Vec<Frequency> = Vec::new();

    for (source, text) in texts {
        for kanji in KanjiChar::extract(text) {
            let slot = *index.entry(kanji).or_insert_with(|| {
                frequencies.push(Frequency::new(kanji));
                frequencies.len() - 1
            });

            let frequency = &mut frequencies[slot];
            frequency.seen = frequency.seen.saturating_add(1);

            match frequency.sources.iter_mut().find(|s| s.name == source) {
                Some(entry) => entry.seen = entry.seen.saturating_add(1),
                None => frequency.sources.push(SourceFrequency {
                    name: source.to_string(),
                    seen: 1,
                }),
            }
        }
    }

    let total = frequencies
        .iter()
        .map(|f| u64::from(f.seen))
        .fold(0u64, u64::saturating_add) as f64;

    if total.is_normal() {
        for frequency in &mut frequencies {
            frequency.ratio = f64::from(frequency.seen) / total;
            frequency.level = Level::from_ratio(frequency.ratio);
        }
    }

    frequencies
}

/// Quiz aggregates of a single kanji.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub kanji: KanjiChar,
    pub quizzes: u64,
    pub correct_quiz_answers: u64,
    pub quiz_accuracy: Option<f64>,
}

impl ItemStats {
    pub fn compute(kanji: KanjiChar, answers: &[QuizAnswer]) -> Self {
        let (quizzes, correct) = count(answers.iter().filter(|a| a.question == kanji));
        Self {
            kanji,
            quizzes,
            correct_quiz_answers: correct,
            quiz_accuracy: accuracy(correct, quizzes),
        }
    }
}

/// Quiz aggregates of a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSourceStats {
    pub source: SourceId,
    pub quizzes: u64,
    pub correct_quiz_answers: u64,
    pub quiz_accuracy: Option<f64>,
}

impl QuizSourceStats {
    pub fn compute(source: SourceId, answers: &[QuizAnswer]) -> Self {
        let (quizzes, correct) = count(answers.iter().filter(|a| a.source_id == Some(source)));
        Self {
            source,
            quizzes,
            correct_quiz_answers: correct,
            quiz_accuracy: accuracy(correct, quizzes),
        }
    }
}

/// Per-source stats for every source that was quizzed at least once,
/// most-quizzed first.
pub fn compute_source_stats(sources: &[SourceId], answers: &[QuizAnswer]) -> Vec<QuizSourceStats> {
    let mut stats: Vec<QuizSourceStats> = sources
        .iter()
        .map(|&source| QuizSourceStats::compute(source, answers))
        .filter(|s| s.quizzes > 0)
        .collect();

    stats.sort_by(|a, b| b.quizzes.cmp(&a.quizzes));
    stats
}

/// One chunk of the aggregate kanji set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanjiSetChunk {
    pub id: KanjiSetChunkId,
    pub kanjis: Vec<KanjiChar>,
    pub quizzes: u64,
    pub correct_quiz_answers: u64,
    pub quiz_accuracy: Option<f64>,
}

/// Every known kanji, most frequent first, split into fixed-size chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanjiSet {
    pub chunks: Vec<KanjiSetChunk>,
    pub quizzes: u64,
    pub correct_quiz_answers: u64,
    pub quiz_accuracy: Option<f64>,
}

impl KanjiSet {
    /// Build the set from frequency entries and the answer log.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn build(frequencies: &[Frequency], chunk_size: usize, answers: &[QuizAnswer]) -> Self {
        let mut ordered: Vec<&Frequency> = frequencies.iter().collect();
        ordered.sort_by(|a, b| b.seen.cmp(&a.seen));

        let chunks: Vec<KanjiSetChunk> = ordered
            .chunks(chunk_size.max(1))
            .zip(1u32..)
            .map(|(chunk, id)| {
                let kanjis: Vec<KanjiChar> = chunk.iter().map(|f| f.kanji).collect();
                let members: HashSet<KanjiChar> = kanjis.iter().copied().collect();
                let (quizzes, correct) =
                    count(answers.iter().filter(|a| members.contains(&a.question)));

                KanjiSetChunk {
                    id: KanjiSetChunkId(id),
                    kanjis,
                    quizzes,
                    correct_quiz_answers: correct,
                    quiz_accuracy: accuracy(correct, quizzes),
                }
            })
            .collect();

        let quizzes = chunks.iter().map(|c| c.quizzes).sum();
        let correct = chunks.iter().map(|c| c.correct_quiz_answers).sum();

        Self {
            chunks,
            quizzes,
            correct_quiz_answers: correct,
            quiz_accuracy: accuracy(correct, quizzes),
        }
    }

    /// The chunk holding exactly `kanjis` (in any order), if there is one.
    pub fn find_chunk(&self, kanjis: &[KanjiChar]) -> Option<KanjiSetChunkId> {
        let wanted: HashSet<KanjiChar> = kanjis.iter().copied().collect();
        self.chunks
            .iter()
            .find(|chunk| {
                chunk.kanjis.len() == wanted.len()
                    && chunk.kanjis.iter().all(|k| wanted.contains(k))
            })
            .map(|chunk| chunk.id)
    }
}

/// When a chunk was last quizzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizChunkHistoryEntry {
    pub id: KanjiSetChunkId,
    pub last_quiz: DateTime<Utc>,
}

fn count<'a>(answers: impl Iterator<Item = &'a QuizAnswer>) -> (u64, u64) {
    answers.fold((0, 0), |(quizzes, correct), answer| {
        (quizzes + 1, correct + u64::from(answer.is_correct()))
    })
}
