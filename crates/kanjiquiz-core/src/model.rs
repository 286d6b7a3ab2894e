//! Core data model types for kanjiquiz.
//!
//! These are the fundamental types that the engine and every store
//! implementation use to represent kanji, sources, snippets, and quizzes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuizError;

/// Mark that replaces the answer inside a censored snippet.
pub const CENSOR_MARK: &str = "\u{25ef}";

// ---------------------------------------------------------------------------
// Kanji
// ---------------------------------------------------------------------------

/// Returns `true` if `c` lies in the CJK unified ideograph ranges used for kanji.
pub const fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9faf}' | '\u{3400}'..='\u{4dbf}')
}

/// A single validated kanji character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KanjiChar(char);

impl KanjiChar {
    pub fn from_char(c: char) -> Option<Self> {
        is_kanji(c).then_some(Self(c))
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Every kanji in `text`, in order of appearance (duplicates included).
    pub fn extract(text: &str) -> impl Iterator<Item = KanjiChar> + '_ {
        text.chars().filter_map(KanjiChar::from_char)
    }
}

impl fmt::Display for KanjiChar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KanjiChar {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                KanjiChar::from_char(c).ok_or_else(|| QuizError::invalid_kanji(s))
            }
            _ => Err(QuizError::invalid_kanji(s)),
        }
    }
}

impl TryFrom<String> for KanjiChar {
    type Error = QuizError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KanjiChar> for String {
    fn from(kanji: KanjiChar) -> Self {
        kanji.0.to_string()
    }
}

/// Difficulty level derived from how often a kanji appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Common,
    Uncommon,
    Rare,
    VeryRare,
    Unknown,
}

impl Level {
    /// Classify a frequency ratio (`seen / total`).
    pub fn from_ratio(ratio: f64) -> Self {
        let percent = ratio * 100.0;
        if percent >= 0.1 {
            Self::Common
        } else if percent >= 0.01 {
            Self::Uncommon
        } else if percent >= 0.001 {
            Self::Rare
        } else if percent >= 0.0001 {
            Self::VeryRare
        } else {
            Self::Unknown
        }
    }
}

/// How many times a kanji was seen in one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFrequency {
    pub name: String,
    pub seen: u32,
}

/// Frequency statistics of a single kanji across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub kanji: KanjiChar,
    pub seen: u32,
    pub ratio: f64,
    pub level: Level,
    pub sources: Vec<SourceFrequency>,
}

impl Frequency {
    pub fn new(kanji: KanjiChar) -> Self {
        Self {
            kanji,
            seen: 0,
            ratio: 0.0,
            level: Level::Unknown,
            sources: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Source`].
    SourceId(u32)
);
id_type!(
    /// Identifier of a [`SourceGroup`].
    SourceGroupId(u32)
);
id_type!(
    /// Identifier of a persisted [`Bookmark`].
    BookmarkId(i64)
);
id_type!(
    /// Identifier of a persisted [`QuizAnswer`].
    QuizAnswerId(u64)
);
id_type!(
    /// 1-based identifier of a chunk of the aggregate kanji set.
    KanjiSetChunkId(u32)
);
id_type!(
    /// Process-unique identifier of a [`Snippet`].
    SnippetId(u64)
);

static NEXT_SNIPPET_ID: AtomicU64 = AtomicU64::new(0);

impl SnippetId {
    pub fn next() -> Self {
        Self(NEXT_SNIPPET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Sampling weight of a source, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct SourceWeight(u8);

impl SourceWeight {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(weight: u8) -> Self {
        Self(weight.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for SourceWeight {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl From<u8> for SourceWeight {
    fn from(weight: u8) -> Self {
        Self::new(weight)
    }
}

impl From<SourceWeight> for u8 {
    fn from(weight: SourceWeight) -> Self {
        weight.0
    }
}

impl From<SourceWeight> for f64 {
    fn from(weight: SourceWeight) -> Self {
        f64::from(weight.0)
    }
}

/// An origin of study content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub path: String,
    pub enabled: bool,
    pub weight: SourceWeight,
}

/// A named set of sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub id: SourceGroupId,
    pub name: String,
    pub sources: BTreeSet<SourceId>,
}

// ---------------------------------------------------------------------------
// Snippets and bookmarks
// ---------------------------------------------------------------------------

/// Where a snippet was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetSource {
    pub id: SourceId,
    pub name: String,
    pub path: String,
    /// 1-based line number.
    pub line: usize,
}

/// One line of source text containing a quiz answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: SnippetId,
    pub content: String,
    pub source: SnippetSource,
    #[serde(default)]
    pub bookmark: Option<BookmarkId>,
}

/// A saved snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: BookmarkId,
    pub snippet: String,
    pub source_id: SourceId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub snippet: Snippet,
    /// Snippet content with the answer masked.
    pub censored: String,
    pub answer: KanjiChar,
    /// The answer and its distractors, in presentation order.
    pub options: Vec<KanjiChar>,
}

impl QuizQuestion {
    /// Build a question, censoring every occurrence of `answer` in the snippet.
    pub fn new(snippet: Snippet, answer: KanjiChar, options: Vec<KanjiChar>) -> Self {
        let censored = snippet.content.replace(answer.as_char(), CENSOR_MARK);
        Self {
            snippet,
            censored,
            answer,
            options,
        }
    }

    pub fn is_correct(&self, chosen: KanjiChar) -> bool {
        self.answer == chosen
    }
}

/// An ordered sequence of questions, unique by answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<QuizQuestion>", into = "Vec<QuizQuestion>")]
pub struct Quiz(Vec<QuizQuestion>);

impl Quiz {
    /// Build a quiz, keeping only the first question for each answer.
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        let mut seen = BTreeSet::new();
        let questions = questions
            .into_iter()
            .filter(|q| seen.insert(q.answer))
            .collect();
        Self(questions)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.0
    }

    pub fn into_questions(self) -> Vec<QuizQuestion> {
        self.0
    }
}

impl From<Vec<QuizQuestion>> for Quiz {
    fn from(questions: Vec<QuizQuestion>) -> Self {
        Self::new(questions)
    }
}

impl From<Quiz> for Vec<QuizQuestion> {
    fn from(quiz: Quiz) -> Self {
        quiz.0
    }
}

/// A persisted answer. `question == answer` means the answer was correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub id: QuizAnswerId,
    pub question: KanjiChar,
    pub answer: KanjiChar,
    pub source_id: Option<SourceId>,
    pub created_at: DateTime<Utc>,
}

impl QuizAnswer {
    pub fn is_correct(&self) -> bool {
        self.question == self.answer
    }
}

/// What a new quiz should be built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QuizKind {
    Chunk { chunk: Vec<KanjiChar> },
    RandomChunk,
    Source { ids: Vec<SourceId> },
    RandomSource,
    SourceGroup { ids: Vec<SourceGroupId> },
    RandomSourceGroup,
    Url { urls: Vec<String> },
}

impl fmt::Display for QuizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizKind::Chunk { chunk } => write!(f, "chunk ({} kanji)", chunk.len()),
            QuizKind::RandomChunk => write!(f, "random chunk"),
            QuizKind::Source { ids } => write!(f, "sources ({})", ids.len()),
            QuizKind::RandomSource => write!(f, "random source"),
            QuizKind::SourceGroup { ids } => write!(f, "source groups ({})", ids.len()),
            QuizKind::RandomSourceGroup => write!(f, "random source group"),
            QuizKind::Url { urls } => write!(f, "urls ({})", urls.len()),
        }
    }
}
