//! Result ordering
//!
//! Unfiltered lists are ordered by recency score. Once the user types a
//! filter, each item's fuzzy match quality is normalized against the best
//! match in the list and blended with its recency score:
//!
//! ```text
//! combined = fuzzy_weight * (fuzzy / max_fuzzy * 100) + recency_weight * recency
//! ```
//!
//! Ties always fall back to name, then path, then line, so the order is
//! deterministic across refreshes.

use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::RankingConfig;
use crate::models::{RankedItem, SymbolOccurrence};
use crate::recency::{RecencyEngine, now_ms};

/// Scores candidate strings against a query
pub trait FuzzyMatcher: Send + Sync {
    /// One entry per haystack; `None` means no match. Case-sensitive only
    /// when the query contains an uppercase letter.
    fn score(&self, query: &str, haystacks: &[&str]) -> Vec<Option<u32>>;
}

/// nucleo-backed fuzzy matcher
#[derive(Debug, Default, Clone, Copy)]
pub struct NucleoMatcher;

impl FuzzyMatcher for NucleoMatcher {
    fn score(&self, query: &str, haystacks: &[&str]) -> Vec<Option<u32>> {
        let pattern = Pattern::new(query, CaseMatching::Smart, Normalization::Smart, AtomKind::Fuzzy);
        let mut matcher = Matcher::new(Config::DEFAULT);
        let mut buf = Vec::new();

        haystacks
            .iter()
            .map(|h| pattern.score(Utf32Str::new(h, &mut buf), &mut matcher))
            .collect()
    }
}

/// Score descending, then name, path, line ascending
pub fn compare_items(a: &RankedItem, b: &RankedItem) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.occurrence.name.cmp(&b.occurrence.name))
        .then_with(|| a.occurrence.path.cmp(&b.occurrence.path))
        .then_with(|| a.occurrence.line.cmp(&b.occurrence.line))
}

pub fn sort_items(items: &mut [RankedItem]) {
    items.sort_by(compare_items);
}

/// Blend a normalized (0..=100) fuzzy score with a recency score
pub fn combined_score(normalized_fuzzy: f64, recency: f64, weights: &RankingConfig) -> f64 {
    weights.fuzzy_weight * normalized_fuzzy + weights.recency_weight * recency
}

/// Attach current recency scores and sort
///
/// Cached lists go through here too: recency decays continuously, so a
/// stored order is never trusted.
pub fn rank_by_recency<I>(occurrences: I, recency: &RecencyEngine) -> Vec<RankedItem>
where
    I: IntoIterator<Item = SymbolOccurrence>,
{
    rank_by_recency_at(occurrences, recency, now_ms())
}

pub fn rank_by_recency_at<I>(occurrences: I, recency: &RecencyEngine, now_ms: i64) -> Vec<RankedItem>
where
    I: IntoIterator<Item = SymbolOccurrence>,
{
    let occurrences: Vec<SymbolOccurrence> = occurrences.into_iter().collect();
    let keys: Vec<String> = occurrences.iter().map(|o| o.recency_key()).collect();
    let scores = recency.get_scores_at(&keys, now_ms);

    let mut items: Vec<RankedItem> = occurrences
        .into_iter()
        .zip(keys.iter())
        .map(|(occurrence, key)| {
            let score = scores.get(key).map_or(0.0, |s| s.score);
            RankedItem::new(occurrence, score)
        })
        .collect();

    sort_items(&mut items);
    items
}

/// Applies a live filter string to a recency-ranked list
pub struct Ranker {
    matcher: Arc<dyn FuzzyMatcher>,
    weights: RankingConfig,
}

impl Ranker {
    pub fn new(matcher: Arc<dyn FuzzyMatcher>, weights: RankingConfig) -> Self {
        Self { matcher, weights }
    }

    /// Filter and reorder `base`, whose item scores are recency scores
    ///
    /// An empty query returns `base` in recency order. Otherwise items the
    /// matcher rejects are dropped and the rest carry their combined score.
    pub fn filter(&self, base: &[RankedItem], query: &str) -> Vec<RankedItem> {
        if query.trim().is_empty() {
            let mut items = base.to_vec();
            sort_items(&mut items);
            return items;
        }

        let names: Vec<&str> = base.iter().map(|i| i.occurrence.name.as_str()).collect();
        let fuzzy = self.matcher.score(query.trim(), &names);
        let max = fuzzy.iter().flatten().copied().max().unwrap_or(0);

        let mut items: Vec<RankedItem> = base
            .iter()
            .zip(fuzzy)
            .filter_map(|(item, fuzzy)| {
                let fuzzy = fuzzy?;
                let normalized = if max > 0 {
                    fuzzy as f64 / max as f64 * 100.0
                } else {
                    0.0
                };
                let score = combined_score(normalized, item.score, &self.weights);
                Some(RankedItem::new(item.occurrence.clone(), score))
            })
            .collect();

        sort_items(&mut items);
        log::debug!("Filter '{}' kept {} of {} items", query, items.len(), base.len());
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolKind;
    use std::collections::HashMap;

    /// Fixed fuzzy scores per haystack, ignoring the query
    struct FixedMatcher(HashMap<&'static str, u32>);

    impl FuzzyMatcher for FixedMatcher {
        fn score(&self, _query: &str, haystacks: &[&str]) -> Vec<Option<u32>> {
            haystacks.iter().map(|h| self.0.get(h).copied()).collect()
        }
    }

    fn item(name: &str, path: &str, line: usize, score: f64) -> RankedItem {
        RankedItem::new(
            SymbolOccurrence {
                name: name.to_string(),
                path: path.to_string(),
                line,
                start_col: 0,
                end_col: name.len(),
                kind: SymbolKind::Function,
            },
            score,
        )
    }

    fn names(items: &[RankedItem]) -> Vec<&str> {
        items.iter().map(|i| i.occurrence.name.as_str()).collect()
    }

    #[test]
    fn test_sort_ties_break_on_name_path_line() {
        let mut items = vec![
            item("b", "a.ts", 1, 5.0),
            item("a", "z.ts", 9, 5.0),
            item("a", "b.ts", 2, 5.0),
            item("a", "b.ts", 1, 5.0),
            item("c", "a.ts", 1, 9.0),
        ];
        sort_items(&mut items);
        let order: Vec<_> = items
            .iter()
            .map(|i| (i.occurrence.name.as_str(), i.occurrence.path.as_str(), i.occurrence.line))
            .collect();
        assert_eq!(
            order,
            vec![("c", "a.ts", 1), ("a", "b.ts", 1), ("a", "b.ts", 2), ("a", "z.ts", 9), ("b", "a.ts", 1)]
        );
    }

    #[test]
    fn test_combined_score_example() {
        let weights = RankingConfig::default();
        let first = combined_score(100.0, 0.0, &weights);
        let second = combined_score(50.0, 100.0, &weights);
        assert!((first - 60.0).abs() < 1e-9);
        assert!((second - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_weaker_match_outranks_stale_strong_match() {
        let matcher = FixedMatcher(HashMap::from([("strong", 100), ("recent", 50)]));
        let ranker = Ranker::new(Arc::new(matcher), RankingConfig::default());
        let base = vec![item("strong", "a.ts", 1, 0.0), item("recent", "b.ts", 1, 100.0)];

        let ranked = ranker.filter(&base, "q");
        assert_eq!(names(&ranked), vec!["recent", "strong"]);
        assert!((ranked[0].score - 70.0).abs() < 1e-9);
        assert!((ranked[1].score - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalization_uses_max_in_list() {
        let matcher = FixedMatcher(HashMap::from([("a", 400), ("b", 200)]));
        let ranker = Ranker::new(Arc::new(matcher), RankingConfig::default());
        let ranked = ranker.filter(&[item("a", "x", 1, 0.0), item("b", "x", 2, 0.0)], "q");
        assert!((ranked[0].score - 60.0).abs() < 1e-9);
        assert!((ranked[1].score - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_matches_are_dropped_and_empty_query_restores() {
        let matcher = FixedMatcher(HashMap::from([("keep", 10)]));
        let ranker = Ranker::new(Arc::new(matcher), RankingConfig::default());
        let base = vec![item("keep", "a", 1, 1.0), item("drop", "a", 2, 50.0)];

        assert_eq!(names(&ranker.filter(&base, "k")), vec!["keep"]);
        assert_eq!(names(&ranker.filter(&base, "  ")), vec!["drop", "keep"]);
    }

    #[test]
    fn test_nucleo_matcher_smart_case() {
        let matcher = NucleoMatcher;
        let scores = matcher.score("usr", &["UserService", "parse", "users"]);
        assert!(scores[0].is_some());
        assert!(scores[1].is_none());
        assert!(scores[2].is_some());

        let strict = matcher.score("User", &["UserService", "users"]);
        assert!(strict[0].is_some());
        assert!(strict[1].is_none());
    }
}
