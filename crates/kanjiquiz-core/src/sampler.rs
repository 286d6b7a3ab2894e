//! Weighted source sampling.
//!
//! Only enabled sources take part. A source with weight `w` among enabled
//! sources with weights `w1..wn` is picked with probability `w / sum(wi)`,
//! or uniformly when source weights are ignored. No enabled sources means
//! an empty result, never an error.

use std::collections::{BTreeMap, HashMap};

use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::model::{Source, SourceId};

/// Picks sources, and items belonging to sources, by source weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSampler {
    ignore_weight: bool,
}

impl SourceSampler {
    pub fn new(ignore_weight: bool) -> Self {
        Self { ignore_weight }
    }

    pub fn ignores_weight(&self) -> bool {
        self.ignore_weight
    }

    fn weight(&self, source: &Source) -> f64 {
        if self.ignore_weight {
            1.0
        } else {
            f64::from(source.weight)
        }
    }

    fn enabled_weights(&self, sources: &[Source]) -> HashMap<SourceId, f64> {
        sources
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.id, self.weight(s)))
            .collect()
    }

    /// Pick one enabled source.
    pub fn pick<R: Rng + ?Sized>(&self, sources: &[Source], rng: &mut R) -> Option<SourceId> {
        let enabled: Vec<&Source> = sources.iter().filter(|s| s.enabled).collect();
        let dist = WeightedIndex::new(enabled.iter().map(|s| self.weight(s))).ok()?;
        Some(enabled[dist.sample(rng)].id)
    }

    /// Group `items` by their enabled source.
    ///
    /// Groups are ordered by source id, never by the order sources or items
    /// were inserted. Items keep their relative order inside a group. Items
    /// of disabled or unknown sources are dropped, and sources without items
    /// produce no group.
    pub fn partition<T, I, F>(
        &self,
        items: I,
        source_of: F,
        sources: &[Source],
    ) -> Vec<(SourceId, Vec<T>)>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> SourceId,
    {
        let enabled = self.enabled_weights(sources);
        let mut groups: BTreeMap<SourceId, Vec<T>> = BTreeMap::new();
        for item in items {
            let source = source_of(&item);
            if enabled.contains_key(&source) {
                groups.entry(source).or_default().push(item);
            }
        }

        groups.into_iter().collect()
    }

    /// Pick one item: a source first (by weight, among enabled sources that
    /// have items), then an item of that source uniformly.
    pub fn pick_item<'a, T, F, R>(
        &self,
        items: &'a [T],
        source_of: F,
        sources: &[Source],
        rng: &mut R,
    ) -> Option<&'a T>
    where
        F: Fn(&T) -> SourceId,
        R: Rng + ?Sized,
    {
        let weights = self.enabled_weights(sources);
        let groups = self.partition(items.iter(), |item| source_of(item), sources);
        let dist = WeightedIndex::new(groups.iter().map(|(id, _)| weights[id])).ok()?;
        let (_, group) = &groups[dist.sample(rng)];
        group.choose(rng).copied()
    }

    /// Weighted sample of up to `amount` distinct items, each weighted by
    /// the weight of its source.
    pub fn choose_weighted<'a, T, F, R>(
        &self,
        items: &'a [T],
        amount: usize,
        source_of: F,
        sources: &[Source],
        rng: &mut R,
    ) -> Vec<&'a T>
    where
        F: Fn(&T) -> SourceId,
        R: Rng + ?Sized,
    {
        let weights = self.enabled_weights(sources);
        let eligible: Vec<(&T, f64)> = items
            .iter()
            .filter_map(|item| weights.get(&source_of(item)).map(|w| (item, *w)))
            .collect();

        match eligible.choose_multiple_weighted(rng, amount, |(_, w)| *w) {
            Ok(chosen) => chosen.map(|(item, _)| *item).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceWeight;
    use rand::rngs::StdRng;

    fn source(id: u32, weight: u8, enabled: bool) -> Source {
        Source {
            id: SourceId(id),
            name: format!("source-{id}"),
            path: format!("/texts/{id}"),
            enabled,
            weight: SourceWeight::new(weight),
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn pick_follows_weights() {
        let sources = vec![source(1, 1, true), source(2, 3, true)];
        let sampler = SourceSampler::new(false);
        let mut rng = rng();

        let mut heavy = 0u32;
        let mut light = 0u32;
        for _ in 0..8000 {
            match sampler.pick(&sources, &mut rng) {
                Some(SourceId(2)) => heavy += 1,
                Some(SourceId(1)) => light += 1,
                other => panic!("unexpected pick: {other:?}"),
            }
        }

        let ratio = f64::from(heavy) / f64::from(light);
        assert!((2.5..3.5).contains(&ratio), "expected ~3x, got {ratio}");
    }

    #[test]
    fn pick_is_uniform_when_weight_ignored() {
        let sources = vec![source(1, 1, true), source(2, 5, true)];
        let sampler = SourceSampler::new(true);
        let mut rng = rng();

        let heavy = (0..8000)
            .filter(|_| sampler.pick(&sources, &mut rng) == Some(SourceId(2)))
            .count();
        assert!((3600..4400).contains(&heavy), "expected ~4000, got {heavy}");
    }

    #[test]
    fn pick_skips_disabled_sources() {
        let sources = vec![source(1, 5, false), source(2, 1, true)];
        let sampler = SourceSampler::default();
        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(sampler.pick(&sources, &mut rng), Some(SourceId(2)));
        }
    }

    #[test]
    fn no_enabled_sources_yields_nothing() {
        let sampler = SourceSampler::default();
        let mut rng = rng();
        assert_eq!(sampler.pick(&[], &mut rng), None);
        assert_eq!(sampler.pick(&[source(1, 3, false)], &mut rng), None);

        let items = [(SourceId(1), "日")];
        assert!(sampler
            .pick_item(&items, |(id, _)| *id, &[source(1, 3, false)], &mut rng)
            .is_none());
        assert!(sampler
            .choose_weighted(&items, 5, |(id, _)| *id, &[], &mut rng)
            .is_empty());
    }

    #[test]
    fn partition_groups_by_source_id() {
        let sources = vec![source(3, 1, true), source(1, 1, true), source(2, 1, false)];
        let items = vec![
            (SourceId(3), 'a'),
            (SourceId(2), 'b'),
            (SourceId(1), 'c'),
            (SourceId(3), 'd'),
            (SourceId(9), 'e'),
        ];

        let groups = SourceSampler::default().partition(items, |(id, _)| *id, &sources);
        assert_eq!(
            groups,
            vec![
                (SourceId(1), vec![(SourceId(1), 'c')]),
                (SourceId(3), vec![(SourceId(3), 'a'), (SourceId(3), 'd')]),
            ]
        );
    }

    #[test]
    fn pick_item_weights_by_source_not_item_count() {
        // Source 1 has many items but weight 1; source 2 has one item and weight 3.
        let sources = vec![source(1, 1, true), source(2, 3, true)];
        let mut items: Vec<(SourceId, u32)> = (0..50).map(|i| (SourceId(1), i)).collect();
        items.push((SourceId(2), 999));

        let sampler = SourceSampler::new(false);
        let mut rng = rng();
        let heavy = (0..4000)
            .filter(|_| {
                sampler.pick_item(&items, |(id, _)| *id, &sources, &mut rng).map(|(id, _)| *id)
                    == Some(SourceId(2))
            })
            .count();
        assert!((2700..3300).contains(&heavy), "expected ~3000, got {heavy}");
    }

    #[test]
    fn choose_weighted_returns_distinct_items() {
        let sources = vec![source(1, 2, true), source(2, 4, true)];
        let items: Vec<(SourceId, u32)> = (0..10).map(|i| (SourceId(1 + i % 2), i)).collect();

        let mut rng = rng();
        let chosen =
            SourceSampler::default().choose_weighted(&items, 4, |(id, _)| *id, &sources, &mut rng);
        assert_eq!(chosen.len(), 4);

        let mut values: Vec<u32> = chosen.iter().map(|(_, v)| *v).collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 4);
    }
}
