//! Result merging: dedup by normalised URL, score, rank.
//!
//! Hits sharing a [`dedup_key`] collapse into one [`MergedResult`] whose
//! contributing-engine list is the union of the engines that returned it.
//! An engine returning the same URL twice counts once, at its best rank.
//!
//! Ordering is by descending score. Ties keep first-seen order: engines in
//! the order they were passed in, then hits in engine rank order. This
//! depends only on the input order, never on arrival time.

use std::collections::HashMap;

use crate::types::{EngineId, MergedResult, RawHit};

use super::scoring::combined_score;
use super::url_normalize::{dedup_key, normalize_url};

/// Merges per-engine hit lists into one ranked list.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    weights: HashMap<EngineId, f64>,
    max_results: Option<usize>,
}

/// A merged result under construction.
struct Group {
    url: String,
    key: String,
    title: String,
    snippet: String,
    engines: Vec<EngineId>,
    /// Best rank per contributing engine, parallel to `engines`.
    ranks: Vec<u32>,
}

impl Aggregator {
    /// Aggregator with every engine weighted 1.0 and no result cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set per-engine ranking weights. Unlisted engines weigh 1.0.
    pub fn with_weights<I>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = (EngineId, f64)>,
    {
        self.weights = weights.into_iter().collect();
        self
    }

    /// Keep at most `max_results` merged results.
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn weight(&self, engine: &EngineId) -> f64 {
        self.weights.get(engine).copied().unwrap_or(1.0)
    }

    /// Merge `hits`, given as `(engine, hits)` pairs in engine registration
    /// order, into a ranked, deduplicated list.
    ///
    /// Hits with a blank URL are dropped.
    pub fn merge(&self, hits: &[(EngineId, Vec<RawHit>)]) -> Vec<MergedResult> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for (engine, engine_hits) in hits {
            for hit in engine_hits {
                if hit.url.trim().is_empty() {
                    continue;
                }
                let key = dedup_key(&hit.url);
                let rank = hit.rank.max(1);

                match index.get(&key) {
                    Some(&slot) => {
                        let group = &mut groups[slot];
                        match group.engines.iter().position(|e| e == engine) {
                            Some(pos) => group.ranks[pos] = group.ranks[pos].min(rank),
                            None => {
                                group.engines.push(engine.clone());
                                group.ranks.push(rank);
                            }
                        }
                        if group.title.trim().is_empty() {
                            group.title = hit.title.clone();
                        }
                        if hit.snippet.len() > group.snippet.len() {
                            group.snippet = hit.snippet.clone();
                        }
                    }
                    None => {
                        index.insert(key.clone(), groups.len());
                        groups.push(Group {
                            url: normalize_url(&hit.url),
                            key,
                            title: hit.title.clone(),
                            snippet: hit.snippet.clone(),
                            engines: vec![engine.clone()],
                            ranks: vec![rank],
                        });
                    }
                }
            }
        }

        let mut merged: Vec<MergedResult> = groups
            .into_iter()
            .map(|group| {
                let score = combined_score(
                    group
                        .engines
                        .iter()
                        .zip(&group.ranks)
                        .map(|(engine, &rank)| (self.weight(engine), rank)),
                );
                MergedResult {
                    url: group.url,
                    normalized_url: group.key,
                    title: group.title,
                    snippet: group.snippet,
                    engines: group.engines,
                    score,
                    position: 0,
                }
            })
            .collect();

        // Stable sort: equal scores keep first-seen order.
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));

        if let Some(max) = self.max_results {
            merged.truncate(max);
        }
        for (i, result) in merged.iter_mut().enumerate() {
            result.position = i + 1;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(name: &str) -> EngineId {
        EngineId::new(name, "general")
    }

    fn hit(engine_name: &str, rank: u32, url: &str) -> RawHit {
        RawHit::new(
            engine(engine_name),
            rank,
            url,
            format!("Title from {engine_name}"),
            format!("Snippet from {engine_name}"),
        )
    }

    #[test]
    fn unique_urls_pass_through() {
        let merged = Aggregator::new().merge(&[
            (engine("a"), vec![hit("a", 1, "https://a.com")]),
            (engine("b"), vec![hit("b", 1, "https://b.com")]),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn trailing_slash_duplicates_merge_across_engines() {
        let merged = Aggregator::new().merge(&[
            (engine("a"), vec![hit("a", 1, "http://example.com/page")]),
            (engine("b"), vec![hit("b", 1, "http://example.com/page/")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].engines().len(), 2);
        assert_eq!(merged[0].engine_names(), vec!["a", "b"]);
    }

    #[test]
    fn scheme_variants_merge() {
        let merged = Aggregator::new().merge(&[
            (engine("a"), vec![hit("a", 1, "http://example.com/x")]),
            (engine("b"), vec![hit("b", 3, "https://example.com/x")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].url(), "http://example.com/x");
    }

    #[test]
    fn multi_engine_result_outscores_single_engine() {
        let merged = Aggregator::new().merge(&[
            (
                engine("a"),
                vec![hit("a", 1, "https://solo.com"), hit("a", 2, "https://both.com")],
            ),
            (engine("b"), vec![hit("b", 1, "https://both.com")]),
        ]);
        assert_eq!(merged[0].url(), "https://both.com/");
        assert!(merged[0].score() > merged[1].score());
    }

    #[test]
    fn two_rank_one_engines_beat_one() {
        let merged = Aggregator::new().merge(&[
            (engine("a"), vec![hit("a", 1, "https://x.com"), hit("a", 2, "https://y.com")]),
            (engine("b"), vec![hit("b", 1, "https://y.com")]),
            (engine("c"), vec![hit("c", 1, "https://y.com"), hit("c", 2, "https://x.com")]),
        ]);
        let y = merged.iter().find(|r| r.url() == "https://y.com/").expect("y present");
        let x = merged.iter().find(|r| r.url() == "https://x.com/").expect("x present");
        assert!(y.score() > x.score());
    }

    #[test]
    fn same_engine_duplicate_counted_once_at_best_rank() {
        let merged = Aggregator::new().merge(&[(
            engine("a"),
            vec![hit("a", 1, "https://example.com"), hit("a", 4, "https://example.com/")],
        )]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].engines().len(), 1);
        assert!((merged[0].score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ties_broken_by_engine_order() {
        let merged = Aggregator::new().merge(&[
            (engine("first"), vec![hit("first", 1, "https://one.com")]),
            (engine("second"), vec![hit("second", 1, "https://two.com")]),
            (engine("third"), vec![hit("third", 1, "https://three.com")]),
        ]);
        let urls: Vec<&str> = merged.iter().map(MergedResult::url).collect();
        assert_eq!(
            urls,
            vec!["https://one.com/", "https://two.com/", "https://three.com/"]
        );
    }

    #[test]
    fn ordering_is_reproducible() {
        let input: Vec<(EngineId, Vec<RawHit>)> = vec![
            (engine("a"), (1..=5).map(|r| hit("a", r, &format!("https://a{r}.com"))).collect::<Vec<_>>()),
            (engine("b"), (1..=5).map(|r| hit("b", r, &format!("https://b{r}.com"))).collect::<Vec<_>>()),
        ];
        let aggregator = Aggregator::new();
        let first: Vec<String> = aggregator.merge(&input).iter().map(|r| r.url().to_owned()).collect();
        let second: Vec<String> = aggregator.merge(&input).iter().map(|r| r.url().to_owned()).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], "https://a1.com/");
        assert_eq!(first[1], "https://b1.com/");
    }

    #[test]
    fn engine_weight_applied() {
        let aggregator = Aggregator::new().with_weights([(engine("heavy"), 2.0)]);
        let merged = aggregator.merge(&[
            (engine("light"), vec![hit("light", 1, "https://light.com")]),
            (engine("heavy"), vec![hit("heavy", 1, "https://heavy.com")]),
        ]);
        assert_eq!(merged[0].url(), "https://heavy.com/");
        assert!((merged[0].score() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn positions_are_one_based_and_sequential() {
        let merged = Aggregator::new().merge(&[(
            engine("a"),
            (1..=4).map(|r| hit("a", r, &format!("https://p{r}.com"))).collect::<Vec<_>>(),
        )]);
        let positions: Vec<usize> = merged.iter().map(MergedResult::position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn max_results_truncates_after_ranking() {
        let aggregator = Aggregator::new().with_max_results(Some(2));
        let merged = aggregator.merge(&[(
            engine("a"),
            (1..=5).map(|r| hit("a", r, &format!("https://t{r}.com"))).collect::<Vec<_>>(),
        )]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].url(), "https://t2.com/");
    }

    #[test]
    fn longer_snippet_wins_and_blank_urls_dropped() {
        let mut short = hit("a", 1, "https://s.com");
        short.snippet = "short".into();
        let mut long = hit("b", 1, "https://s.com");
        long.snippet = "a considerably longer snippet".into();
        let blank = hit("b", 2, "   ");

        let merged = Aggregator::new().merge(&[
            (engine("a"), vec![short]),
            (engine("b"), vec![long, blank]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].snippet(), "a considerably longer snippet");
        assert_eq!(merged[0].title(), "Title from a");
    }

    #[test]
    fn every_merged_result_has_a_contributor() {
        let merged = Aggregator::new().merge(&[
            (engine("a"), vec![hit("a", 1, "https://a.com"), hit("a", 2, "https://c.com")]),
            (engine("b"), vec![hit("b", 1, "https://c.com")]),
            (engine("c"), vec![]),
        ]);
        assert!(merged.iter().all(|r| !r.engines().is_empty()));
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(Aggregator::new().merge(&[]).is_empty());
    }
}
