//! Search strategies over generated pages.

use std::{fmt, str::FromStr};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::address::compare_addresses;
use crate::error::{LibraryError, LibraryResult};
use crate::generator::{PageGenerator, SeedWindow, SubstringMatch};

const SNIPPET_CONTEXT: usize = 50;
const SNIPPET_WINDOW: usize = 100;
const SNIPPET_STRIDE: usize = 10;
const PROXIMITY_LIMIT: f64 = 200.0;
const NGRAM_SIZE: usize = 3;
const NGRAM_MIN_RATIO: f64 = 0.1;

/// How candidates are produced and scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Hash-anchored scan for the literal query.
    Exact,
    /// Phrase fragments over synthesized candidates.
    #[default]
    Fragments,
    /// Character trigram overlap over synthesized candidates.
    Ngram,
    /// Residue-pruned scan of raw seeds for the literal query.
    Inversion,
}

impl SearchStrategy {
    /// Stable name of the strategy.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fragments => "fragments",
            Self::Ngram => "ngram",
            Self::Inversion => "inversion",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SearchStrategy {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "fragments" => Ok(Self::Fragments),
            "ngram" => Ok(Self::Ngram),
            "inversion" => Ok(Self::Inversion),
            other => Err(LibraryError::UnknownStrategy(other.to_string())),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page address.
    pub address: String,
    /// Excerpt around the match.
    pub snippet: String,
    /// Strategy score in `[0, 100]`.
    pub score: f64,
    /// Strategy that produced the hit.
    pub strategy: SearchStrategy,
    /// Offset of the literal match (exact and inversion only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Fragments found on the page (fragments only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_hits: Option<usize>,
}

/// Runs search strategies against a generator.
#[derive(Debug, Clone, Copy)]
pub struct Searcher {
    generator: PageGenerator,
    exact_window: SeedWindow,
    inversion_window: SeedWindow,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(
            PageGenerator::new(),
            SeedWindow::SUBSTRING_DEFAULT,
            SeedWindow::INVERSION_DEFAULT,
        )
    }
}

impl Searcher {
    /// Creates a searcher with default windows for the exact and inversion strategies.
    #[must_use]
    pub const fn new(
        generator: PageGenerator,
        exact_window: SeedWindow,
        inversion_window: SeedWindow,
    ) -> Self {
        Self {
            generator,
            exact_window,
            inversion_window,
        }
    }

    /// Underlying generator.
    #[must_use]
    pub const fn generator(&self) -> &PageGenerator {
        &self.generator
    }

    /// Runs `strategy` and returns at most `max_results` hits, best first.
    ///
    /// `window` overrides the configured seed window for exact and inversion.
    #[must_use]
    pub fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
        max_results: usize,
        window: Option<SeedWindow>,
    ) -> Vec<SearchHit> {
        if query.trim().is_empty() || max_results == 0 {
            return Vec::new();
        }
        let mut hits = match strategy {
            SearchStrategy::Exact => {
                let lowered = query.to_lowercase();
                let mut matches = self.generator.find_substring_candidates(
                    &lowered,
                    max_results.saturating_mul(2),
                    window.unwrap_or(self.exact_window),
                );
                matches.truncate(max_results);
                self.literal_hits(&matches, &lowered, strategy)
            }
            SearchStrategy::Inversion => {
                let lowered = query.to_lowercase();
                let matches = self.generator.invert_substring(
                    &lowered,
                    max_results,
                    window.unwrap_or(self.inversion_window),
                );
                self.literal_hits(&matches, &lowered, strategy)
            }
            SearchStrategy::Fragments => self.fragment_hits(query, max_results),
            SearchStrategy::Ngram => self.ngram_hits(query, max_results),
        };
        rank_hits(&mut hits);
        hits.truncate(max_results);
        hits
    }

    fn literal_hits(
        &self,
        matches: &[SubstringMatch],
        query: &str,
        strategy: SearchStrategy,
    ) -> Vec<SearchHit> {
        matches
            .par_iter()
            .filter_map(|found| {
                let page = self.generator.page_from_address(&found.address).ok()?;
                Some(SearchHit {
                    snippet: extract_snippet(&page, found.position, query.len(), SNIPPET_CONTEXT),
                    score: score_exact_match(&page, query),
                    address: found.address.clone(),
                    strategy,
                    position: Some(found.position),
                    fragment_hits: None,
                })
            })
            .collect()
    }

    fn fragment_hits(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
        let fragments = self.generator.fragments(query);
        let addresses = self
            .generator
            .generate_candidate_addresses(query, max_results.saturating_mul(2));
        addresses
            .par_iter()
            .filter_map(|address| {
                let page = self.generator.page_from_address(address).ok()?;
                let found = fragments
                    .iter()
                    .filter(|fragment| page.contains(fragment.as_str()))
                    .count();
                (found > 0).then(|| SearchHit {
                    snippet: extract_best_snippet(&page, &fragments, SNIPPET_WINDOW),
                    score: score_fragment_match(&page, &fragments, found),
                    address: address.clone(),
                    strategy: SearchStrategy::Fragments,
                    position: None,
                    fragment_hits: Some(found),
                })
            })
            .collect()
    }

    fn ngram_hits(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
        let lowered = query.to_lowercase();
        let grams = ngrams(&lowered, NGRAM_SIZE);
        let targets = [lowered];
        let addresses = self
            .generator
            .generate_candidate_addresses(query, max_results.saturating_mul(2));
        addresses
            .par_iter()
            .filter_map(|address| {
                let page = self.generator.page_from_address(address).ok()?;
                let ratio = ngram_ratio(&page, &grams);
                (ratio >= NGRAM_MIN_RATIO).then(|| SearchHit {
                    snippet: extract_best_snippet(&page, &targets, SNIPPET_WINDOW),
                    score: ratio * 100.0,
                    address: address.clone(),
                    strategy: SearchStrategy::Ngram,
                    position: None,
                    fragment_hits: None,
                })
            })
            .collect()
    }
}

/// Orders hits by score descending, then by numeric address ascending.
pub fn rank_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| compare_addresses(&a.address, &b.address))
    });
}

/// Text within `context` characters of a match, with `...` on truncated sides.
#[must_use]
pub fn extract_snippet(page: &str, position: usize, length: usize, context: usize) -> String {
    let chars: Vec<char> = page.chars().collect();
    let position = position.min(chars.len());
    let start = position.saturating_sub(context);
    let end = position
        .saturating_add(length)
        .saturating_add(context)
        .min(chars.len());
    let mut snippet = String::with_capacity(end - start + 6);
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.extend(&chars[start..end]);
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}

/// Window of `length` characters containing the most targets, trimmed.
///
/// Windows start every ten characters; the first window is kept unless a later
/// one contains strictly more targets.
#[must_use]
pub fn extract_best_snippet(page: &str, targets: &[String], length: usize) -> String {
    let chars: Vec<char> = page.chars().collect();
    let mut best: &[char] = &chars[..length.min(chars.len())];
    let mut best_count = 0;
    if chars.len() > length {
        for start in (0..chars.len() - length).step_by(SNIPPET_STRIDE) {
            let window = &chars[start..start + length];
            let text: String = window.iter().collect::<String>().to_lowercase();
            let count = targets
                .iter()
                .filter(|target| text.contains(target.as_str()))
                .count();
            if count > best_count {
                best_count = count;
                best = window;
            }
        }
    }
    best.iter().collect::<String>().trim().to_string()
}

/// Score of a literal match: 80, plus 10 for space-delimited occurrence, plus 10 for
/// nearby punctuation, capped at 100.
#[must_use]
pub fn score_exact_match(page: &str, query: &str) -> f64 {
    let page = page.to_lowercase();
    let query = query.to_lowercase();
    let mut score: f64 = 80.0;
    if page.contains(&format!(" {query} ")) {
        score += 10.0;
    }
    if let Some(position) = page.find(&query) {
        let start = floor_boundary(&page, position.saturating_sub(SNIPPET_CONTEXT));
        let end = ceil_boundary(&page, position + query.len() + SNIPPET_CONTEXT);
        if page[start..end].contains(['.', ',']) {
            score += 10.0;
        }
    }
    score.min(100.0)
}

/// Fragment score: coverage times 70, plus 20 when found fragments cluster, capped at 100.
#[must_use]
pub fn score_fragment_match(page: &str, fragments: &[String], found: usize) -> f64 {
    if fragments.is_empty() {
        return 0.0;
    }
    let page = page.to_lowercase();
    let mut score = found as f64 / fragments.len() as f64 * 70.0;

    let mut positions: Vec<usize> = fragments
        .iter()
        .filter_map(|fragment| page.find(fragment.as_str()))
        .collect();
    if positions.len() >= 2 {
        positions.sort_unstable();
        let gaps: usize = positions.windows(2).map(|pair| pair[1] - pair[0]).sum();
        let mean_gap = gaps as f64 / (positions.len() - 1) as f64;
        if mean_gap < PROXIMITY_LIMIT {
            score += 20.0;
        }
    }
    score.min(100.0)
}

/// Overlapping character n-grams of `text` with spaces removed; duplicates are kept.
#[must_use]
pub fn ngrams(text: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().filter(|ch| *ch != ' ').collect();
    if n == 0 || chars.len() < n {
        return Vec::new();
    }
    chars.windows(n).map(|gram| gram.iter().collect()).collect()
}

fn ngram_ratio(page: &str, grams: &[String]) -> f64 {
    if grams.is_empty() {
        return 0.0;
    }
    let stripped: String = page.to_lowercase().chars().filter(|ch| *ch != ' ').collect();
    let found = grams
        .iter()
        .filter(|gram| stripped.contains(gram.as_str()))
        .count();
    found as f64 / grams.len() as f64
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Runs a search with a default searcher.
///
/// # Errors
/// [`LibraryError::UnknownStrategy`] for an unrecognized strategy name.
pub fn search_babel(
    query: &str,
    strategy: &str,
    max_results: usize,
    window: Option<SeedWindow>,
) -> LibraryResult<Vec<SearchHit>> {
    let strategy = strategy.parse::<SearchStrategy>()?;
    Ok(Searcher::default().search(query, strategy, max_results, window))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_ranked(hits: &[SearchHit]) {
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for hit in hits {
            assert!((0.0..=100.0).contains(&hit.score));
        }
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("ngram".parse::<SearchStrategy>().unwrap(), SearchStrategy::Ngram);
        assert_eq!(SearchStrategy::default(), SearchStrategy::Fragments);
        assert!(matches!(
            "fuzzy".parse::<SearchStrategy>(),
            Err(LibraryError::UnknownStrategy(name)) if name == "fuzzy"
        ));
        assert!(search_babel("test", "fuzzy", 5, None).is_err());
    }

    #[test]
    fn exact_search_scores_literal_matches() {
        let searcher = Searcher::default();
        let hits = searcher.search("AB", SearchStrategy::Exact, 3, Some(SeedWindow::new(0, 200)));
        assert_eq!(hits.len(), 3);
        assert_ranked(&hits);
        let expected = ["187ef443", "187ef444", "187ef445"];
        for hit in &hits {
            assert!(expected.contains(&hit.address.as_str()));
            assert!(hit.score >= 80.0);
            assert!(hit.snippet.contains("ab"));
            assert_eq!(hit.strategy, SearchStrategy::Exact);
            let page = searcher.generator().page_from_address(&hit.address).unwrap();
            assert_eq!(page.find("ab"), hit.position);
        }
    }

    #[test]
    fn inversion_search_uses_window() {
        let searcher = Searcher::default();
        let hits = searcher.search("ab", SearchStrategy::Inversion, 5, Some(SeedWindow::new(0, 400)));
        assert_eq!(hits.len(), 5);
        assert_ranked(&hits);
        let zero = hits.iter().find(|hit| hit.address == "0").unwrap();
        assert_eq!(zero.position, Some(1010));
        assert!(zero.snippet.starts_with("..."));
        assert!(zero.snippet.ends_with("..."));
        assert_eq!(zero.snippet.chars().count(), 3 + 102 + 3);
    }

    #[test]
    fn fragment_and_ngram_searches_are_deterministic() {
        let searcher = Searcher::default();
        for strategy in [SearchStrategy::Fragments, SearchStrategy::Ngram] {
            let first = searcher.search("hello world", strategy, 10, None);
            let second = searcher.search("hello world", strategy, 10, None);
            assert_eq!(first, second);
            assert!(first.len() <= 10);
            assert_ranked(&first);
            for hit in &first {
                match strategy {
                    SearchStrategy::Fragments => assert!(hit.fragment_hits.unwrap_or(0) >= 1),
                    _ => assert!(hit.score >= 10.0),
                }
            }
        }
    }

    #[test]
    fn degenerate_queries_find_nothing() {
        let searcher = Searcher::default();
        assert!(searcher.search("", SearchStrategy::Exact, 5, None).is_empty());
        assert!(searcher.search("   ", SearchStrategy::Fragments, 5, None).is_empty());
        assert!(searcher.search("ab", SearchStrategy::Exact, 0, None).is_empty());
    }

    #[test]
    fn equal_scores_rank_by_numeric_address() {
        let hit = |address: &str, score: f64| SearchHit {
            address: address.to_string(),
            snippet: String::new(),
            score,
            strategy: SearchStrategy::Exact,
            position: None,
            fragment_hits: None,
        };
        let mut hits = vec![hit("100", 80.0), hit("ff", 80.0), hit("2", 80.0), hit("1000", 90.0)];
        rank_hits(&mut hits);
        let order: Vec<&str> = hits.iter().map(|hit| hit.address.as_str()).collect();
        assert_eq!(order, ["1000", "2", "ff", "100"]);

        let hits = Searcher::default().search(
            "ab",
            SearchStrategy::Inversion,
            6,
            Some(SeedWindow::new(0, 2000)),
        );
        for pair in hits.windows(2) {
            if (pair[0].score - pair[1].score).abs() < f64::EPSILON {
                assert_eq!(
                    compare_addresses(&pair[0].address, &pair[1].address),
                    std::cmp::Ordering::Less
                );
            }
        }
    }

    #[test]
    fn oversized_result_counts_do_not_overflow() {
        let searcher = Searcher::default();
        let window = Some(SeedWindow::new(0, 200));
        let exact = searcher.search("ab", SearchStrategy::Exact, usize::MAX, window);
        assert!(!exact.is_empty());
        let inverted = searcher.search("ab", SearchStrategy::Inversion, usize::MAX, window);
        assert!(inverted.len() <= 200);
    }

    #[test]
    fn snippet_clamps_positions_past_the_end() {
        assert_eq!(extract_snippet("abcdef", 10, 3, 2), "...ef");
        assert_eq!(extract_snippet("abc", usize::MAX, usize::MAX, usize::MAX), "abc");
        assert_eq!(extract_snippet("", 5, 1, 1), "");
    }

    #[test]
    fn snippet_marks_truncated_sides() {
        let page = "x".repeat(300);
        assert_eq!(extract_snippet(&page, 0, 3, 50), format!("{}...", "x".repeat(53)));
        assert_eq!(extract_snippet(&page, 297, 3, 50), format!("...{}", "x".repeat(53)));
        assert_eq!(extract_snippet("abc", 1, 1, 50), "abc");
    }

    #[test]
    fn best_snippet_prefers_first_strictly_better_window() {
        let mut page = " ".repeat(400);
        page.replace_range(250..255, "hello");
        let best = extract_best_snippet(&page, &["hello".to_string()], 100);
        assert_eq!(best, "hello");
        let none = extract_best_snippet(&"abc ".repeat(100), &["zzz".to_string()], 100);
        assert_eq!(none, "abc ".repeat(25).trim());
    }

    #[test]
    fn exact_scoring_bonuses() {
        assert!((score_exact_match("xx hello xx", "hello") - 90.0).abs() < 1e-9);
        assert!((score_exact_match("xx hello, xx", "hello") - 90.0).abs() < 1e-9);
        assert!((score_exact_match("a hello b.", "HELLO") - 100.0).abs() < 1e-9);
        assert!((score_exact_match("xxhelloxx", "hello") - 80.0).abs() < 1e-9);
        assert!((score_exact_match("hello.", "hello") - 90.0).abs() < 1e-9);
    }

    #[test]
    fn fragment_scoring_rewards_proximity() {
        let fragments = vec!["abc".to_string(), "def".to_string()];
        assert!((score_fragment_match("abc def", &fragments, 2) - 90.0).abs() < 1e-9);
        let far = format!("abc{}def", " ".repeat(300));
        assert!((score_fragment_match(&far, &fragments, 2) - 70.0).abs() < 1e-9);
        assert!(score_fragment_match("abc", &[], 0).abs() < f64::EPSILON);
    }

    #[test]
    fn ngrams_strip_spaces_and_keep_duplicates() {
        assert_eq!(ngrams("ab ab", 3), vec!["aba", "bab"]);
        assert_eq!(ngrams("aaaa", 3), vec!["aaa", "aaa"]);
        assert!(ngrams("ab", 3).is_empty());
        assert!((ngram_ratio("the cat", &ngrams("thecat", 3)) - 1.0).abs() < 1e-9);
    }
}
