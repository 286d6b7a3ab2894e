//! Frequency ranking: a sorted, filtered view over kanji frequency entries.
//!
//! The view keeps the raw snapshot it was given and recomputes the visible
//! entries whenever the snapshot, the sort direction, or the search string
//! changes. It also owns the "currently selected" entry and keeps it valid
//! across recomputes.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Frequency, KanjiChar};
use crate::traits::StatisticsStore;

/// Sort direction of the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub ascending: bool,
}

impl Sorting {
    pub fn ascending() -> Self {
        Self { ascending: true }
    }

    pub fn descending() -> Self {
        Self { ascending: false }
    }

    fn compare(self, a: u32, b: u32) -> Ordering {
        if self.ascending {
            a.cmp(&b)
        } else {
            b.cmp(&a)
        }
    }
}

/// Filter `raw` by `search` and sort it by seen-count.
///
/// An entry is kept when its character occurs in `search`; an empty or
/// missing search keeps everything. Both the entries and each entry's
/// per-source breakdown are sorted with a stable sort, so ties keep their
/// relative input order.
pub fn filter_and_sort(
    raw: &[Frequency],
    sorting: Sorting,
    search: Option<&str>,
) -> Vec<Frequency> {
    let search = search.filter(|s| !s.is_empty());
    let mut entries: Vec<Frequency> = raw
        .iter()
        .filter(|f| search.map_or(true, |s| s.contains(f.kanji.as_char())))
        .cloned()
        .collect();

    entries.sort_by(|a, b| sorting.compare(a.seen, b.seen));
    for entry in &mut entries {
        entry.sources.sort_by(|a, b| sorting.compare(a.seen, b.seen));
    }

    entries
}

/// 1-based position of `kanji` among all entries sorted by seen-count, most
/// seen first. Recomputed on every call.
pub fn rank(raw: &[Frequency], kanji: KanjiChar) -> Option<usize> {
    let mut ordered: Vec<&Frequency> = raw.iter().collect();
    ordered.sort_by(|a, b| b.seen.cmp(&a.seen));
    ordered
        .iter()
        .position(|f| f.kanji == kanji)
        .map(|index| index + 1)
}

/// A sorted, filtered, selectable view of frequency entries.
#[derive(Debug, Clone, Default)]
pub struct FrequencyView {
    sorting: Sorting,
    search: Option<String>,
    raw: Vec<Frequency>,
    entries: Vec<Frequency>,
    selected: Option<KanjiChar>,
}

impl FrequencyView {
    pub fn new(sorting: Sorting) -> Self {
        Self {
            sorting,
            ..Default::default()
        }
    }

    /// Replace the raw snapshot with a fresh one from `store`.
    pub async fn load(&mut self, store: &dyn StatisticsStore) -> Result<()> {
        let raw = store.search_kanji().await?;
        tracing::debug!(entries = raw.len(), "loaded frequency snapshot");
        self.set_raw(raw);
        Ok(())
    }

    pub fn set_raw(&mut self, raw: Vec<Frequency>) {
        self.raw = raw;
        self.refresh();
    }

    pub fn set_sorting(&mut self, sorting: Sorting) {
        self.sorting = sorting;
        self.refresh();
    }

    /// Set the search string. An empty string clears the filter.
    pub fn set_search(&mut self, search: Option<String>) {
        self.search = search.filter(|s| !s.is_empty());
        self.refresh();
    }

    /// Select the entry for `kanji`. Returns `false` (and keeps the current
    /// selection) if it is not in the view.
    pub fn select(&mut self, kanji: KanjiChar) -> bool {
        let visible = self.entries.iter().any(|f| f.kanji == kanji);
        if visible {
            self.selected = Some(kanji);
        }
        visible
    }

    pub fn sorting(&self) -> Sorting {
        self.sorting
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn raw(&self) -> &[Frequency] {
        &self.raw
    }

    pub fn entries(&self) -> &[Frequency] {
        &self.entries
    }

    pub fn selected(&self) -> Option<&Frequency> {
        let kanji = self.selected?;
        self.entries.iter().find(|f| f.kanji == kanji)
    }

    /// Rank of `kanji` in the unfiltered snapshot.
    pub fn rank(&self, kanji: KanjiChar) -> Option<usize> {
        rank(&self.raw, kanji)
    }

    fn refresh(&mut self) {
        self.entries = filter_and_sort(&self.raw, self.sorting, self.search.as_deref());

        if let Some(kanji) = self.selected {
            if !self.entries.iter().any(|f| f.kanji == kanji) {
                self.selected = None;
            }
        }

        if self.selected.is_none() {
            self.selected = self.entries.first().map(|f| f.kanji);
        }
    }
}
