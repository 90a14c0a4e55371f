//! High-level orchestration: search, score, cache, assemble, export.

use std::{path::Path, sync::Arc, time::Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    assembler::{
        export, rank_by_coherence, AssemblyMethod, AssemblyPlan, Book, BookAssembler, ExportFormat,
        Page,
    },
    cache::{CacheStats, PageCache},
    coherence::{CoherenceScorer, CoherenceScores, PageDecoder, Passage},
    config::DiscoveryConfig,
    error::LibraryResult,
    generator::{PageGenerator, SeedWindow},
    searcher::{SearchStrategy, Searcher},
    telemetry::LibraryTelemetry,
};

/// Minimum composite applied when the caller does not choose one.
pub const DEFAULT_MIN_COHERENCE: f64 = 30.0;
/// Candidates requested per wanted result.
const SEARCH_BREADTH: usize = 5;
/// Results requested per page of an assembled book.
const ASSEMBLY_BREADTH: usize = 3;
const SUMMARY_SNIPPET: usize = 100;

/// Parameters of one discovery search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    /// Query identifier.
    pub id: Uuid,
    /// Query text.
    pub query: String,
    /// Strategy used for candidates.
    pub strategy: SearchStrategy,
    /// Candidate breadth handed to the searcher.
    pub max_candidates: usize,
    /// Minimum composite for kept pages.
    pub min_coherence: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl DiscoveryQuery {
    /// Creates a query record with a fresh id.
    #[must_use]
    pub fn new(
        query: impl Into<String>,
        strategy: SearchStrategy,
        max_candidates: usize,
        min_coherence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            strategy,
            max_candidates,
            min_coherence,
            created_at: Utc::now(),
        }
    }
}

/// Ranked pages and statistics of one search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// The query that produced this result.
    pub query: DiscoveryQuery,
    /// Kept pages, most coherent first.
    pub pages: Vec<Page>,
    /// Searcher hits before the coherence filter.
    pub total_candidates: usize,
    /// Number of kept pages.
    pub coherent_pages: usize,
    /// Mean composite of kept pages (0 when none).
    pub average_coherence: f64,
    /// Wall-clock seconds.
    pub execution_time: f64,
}

/// Page entry of a [`DiscoverySummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    /// Page address.
    pub address: String,
    /// Composite coherence.
    pub coherence_score: f64,
    /// Leading content, `...` appended when cut.
    pub snippet: String,
}

/// Compact projection of a [`DiscoveryResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    /// Query text.
    pub query: String,
    /// Strategy used.
    pub strategy: SearchStrategy,
    /// Hits before filtering.
    pub total_candidates: usize,
    /// Kept pages.
    pub coherent_pages: usize,
    /// Mean kept composite.
    pub average_coherence: f64,
    /// Wall-clock seconds.
    pub execution_time: f64,
    /// Page snippets.
    pub pages: Vec<PageSummary>,
}

impl DiscoveryResult {
    /// Projection with page content cut to a 100-character snippet.
    #[must_use]
    pub fn to_summary(&self) -> DiscoverySummary {
        DiscoverySummary {
            query: self.query.query.clone(),
            strategy: self.query.strategy,
            total_candidates: self.total_candidates,
            coherent_pages: self.coherent_pages,
            average_coherence: self.average_coherence,
            execution_time: self.execution_time,
            pages: self
                .pages
                .iter()
                .map(|page| PageSummary {
                    address: page.address.clone(),
                    coherence_score: page.coherence_score,
                    snippet: summary_snippet(&page.content),
                })
                .collect(),
        }
    }
}

fn summary_snippet(content: &str) -> String {
    match content.char_indices().nth(SUMMARY_SNIPPET) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Discovery engine tying generator, searcher, scorer, cache, and assembler together.
#[derive(Debug)]
pub struct DiscoveryEngine {
    generator: PageGenerator,
    searcher: Searcher,
    decoder: PageDecoder,
    assembler: BookAssembler,
    cache: Option<PageCache>,
    min_coherence: f64,
    telemetry: Option<LibraryTelemetry>,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_COHERENCE, true)
    }
}

impl DiscoveryEngine {
    /// Creates an engine with default windows and book size.
    #[must_use]
    pub fn new(min_coherence: f64, cache_enabled: bool) -> Self {
        let generator = PageGenerator::new();
        Self {
            generator,
            searcher: Searcher::new(
                generator,
                SeedWindow::SUBSTRING_DEFAULT,
                SeedWindow::INVERSION_DEFAULT,
            ),
            decoder: PageDecoder::new(CoherenceScorer::default(), min_coherence),
            assembler: BookAssembler::default(),
            cache: cache_enabled.then(PageCache::new),
            min_coherence,
            telemetry: None,
        }
    }

    /// Builds an engine from validated configuration, opening its log when one is set.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        config.validate()?;
        let generator = PageGenerator::new();
        let mut engine = Self {
            generator,
            searcher: Searcher::new(generator, config.exact_window(), config.inversion_window()),
            decoder: PageDecoder::new(CoherenceScorer::default(), config.min_coherence)
                .with_coherent_threshold(config.coherent_threshold),
            assembler: BookAssembler::new(config.default_book_size),
            cache: config.cache_enabled.then(PageCache::new),
            min_coherence: config.min_coherence,
            telemetry: None,
        };
        if let Some(path) = &config.log_path {
            let telemetry = LibraryTelemetry::builder("babel-library")
                .log_path(path)
                .min_level(config.level()?)
                .build()?;
            engine = engine.with_telemetry(telemetry);
        }
        Ok(engine)
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: LibraryTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Default minimum composite.
    #[must_use]
    pub const fn min_coherence(&self) -> f64 {
        self.min_coherence
    }

    /// Pages per book when callers do not choose.
    #[must_use]
    pub const fn default_book_size(&self) -> usize {
        self.assembler.default_book_size()
    }

    /// Page generator.
    #[must_use]
    pub const fn generator(&self) -> &PageGenerator {
        &self.generator
    }

    /// Batch decoder and its scorer.
    #[must_use]
    pub const fn decoder(&self) -> &PageDecoder {
        &self.decoder
    }

    /// Searches with the configured seed windows.
    #[must_use]
    pub fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
        max_results: usize,
        min_coherence: f64,
    ) -> DiscoveryResult {
        self.search_with_window(query, strategy, max_results, min_coherence, None)
    }

    /// Searches, scores every candidate against the query and its fragments, and keeps the best.
    #[must_use]
    pub fn search_with_window(
        &self,
        query: &str,
        strategy: SearchStrategy,
        max_results: usize,
        min_coherence: f64,
        window: Option<SeedWindow>,
    ) -> DiscoveryResult {
        let started = Instant::now();
        let record = DiscoveryQuery::new(
            query,
            strategy,
            max_results.saturating_mul(SEARCH_BREADTH),
            min_coherence,
        );
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "discovery.search.start",
                json!({
                    "query_id": record.id,
                    "query": query,
                    "strategy": strategy.label(),
                    "max_candidates": record.max_candidates,
                }),
            );
        }

        let hits = self
            .searcher
            .search(query, strategy, record.max_candidates, window);
        let mut targets = vec![query.to_string()];
        targets.extend(self.generator.fragments(query));

        let scorer = self.decoder.scorer();
        let mut pages: Vec<Page> = hits
            .par_iter()
            .filter_map(|hit| {
                let content = self.resolve(&hit.address).ok()?;
                let scores = scorer.score_page(&content, &targets);
                (scores.composite >= min_coherence)
                    .then(|| Page::scored(hit.address.clone(), &*content, scores))
            })
            .collect();
        rank_by_coherence(&mut pages);
        pages.truncate(max_results);

        let average_coherence = if pages.is_empty() {
            0.0
        } else {
            pages.iter().map(|page| page.coherence_score).sum::<f64>() / pages.len() as f64
        };
        let result = DiscoveryResult {
            total_candidates: hits.len(),
            coherent_pages: pages.len(),
            average_coherence,
            execution_time: started.elapsed().as_secs_f64(),
            query: record,
            pages,
        };
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "discovery.search.complete",
                json!({
                    "query_id": result.query.id,
                    "total_candidates": result.total_candidates,
                    "coherent_pages": result.coherent_pages,
                    "average_coherence": result.average_coherence,
                    "execution_time": result.execution_time,
                }),
            );
        }
        result
    }

    /// Resolves and scores one page.
    ///
    /// # Errors
    /// [`crate::LibraryError::InvalidAddress`] when `address` is not hex.
    pub fn get_page(&self, address: &str) -> LibraryResult<Page> {
        let outcome = self.resolve(address);
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Debug,
                "discovery.page.lookup",
                json!({ "address": address, "ok": outcome.is_ok() }),
            );
        }
        let content = outcome?;
        let scores = self.decoder.scorer().score_page(&content, &[]);
        Ok(Page::scored(address, &*content, scores))
    }

    /// Scores arbitrary text.
    #[must_use]
    pub fn score_text(&self, text: &str, target_phrases: &[String]) -> CoherenceScores {
        self.decoder.scorer().score_page(text, target_phrases)
    }

    /// Coherent sentence passages of the page at `address`.
    ///
    /// # Errors
    /// [`crate::LibraryError::InvalidAddress`] when `address` is not hex.
    pub fn extract_passages(
        &self,
        address: &str,
        min_passage_length: usize,
        min_coherence: f64,
    ) -> LibraryResult<Vec<Passage>> {
        let content = self.resolve(address)?;
        Ok(self
            .decoder
            .extract_coherent_passages(&content, min_passage_length, min_coherence))
    }

    /// Searches by fragments and assembles one book from the surviving pages.
    ///
    /// Returns `Ok(None)` when no page survives or the policy yields no book.
    ///
    /// # Errors
    /// Assembly failures such as malformed addresses.
    pub fn assemble_book(
        &self,
        query: &str,
        book_size: usize,
        coherence_threshold: f64,
        method: AssemblyMethod,
    ) -> LibraryResult<Option<Book>> {
        let book_size = if book_size == 0 {
            self.default_book_size()
        } else {
            book_size
        };
        let result = self.search(
            query,
            SearchStrategy::Fragments,
            book_size.saturating_mul(ASSEMBLY_BREADTH),
            coherence_threshold,
        );
        if result.pages.is_empty() {
            return Ok(None);
        }
        let plan = match method {
            AssemblyMethod::PhraseRelevance => AssemblyPlan::PhraseRelevance {
                target_phrase: query.to_string(),
                book_size: Some(book_size),
            },
            AssemblyMethod::CoherenceThreshold => AssemblyPlan::CoherenceThreshold {
                min_coherence: coherence_threshold,
                book_size: Some(book_size),
            },
            AssemblyMethod::AddressAdjacency => AssemblyPlan::AddressAdjacency {
                book_size: Some(book_size),
            },
            AssemblyMethod::Custom => AssemblyPlan::Custom {
                title: query.to_string(),
                book_id: None,
            },
        };
        let book = self.assembler.assemble(result.pages, plan)?;
        if let (Some(tel), Some(book)) = (&self.telemetry, &book) {
            let _ = tel.log(
                LogLevel::Info,
                "discovery.book.assembled",
                json!({
                    "book_id": book.book_id,
                    "method": method.label(),
                    "pages": book.page_count(),
                    "coherence": book.coherence_score,
                }),
            );
        }
        Ok(book)
    }

    /// Writes `book` to `path` in `format`.
    ///
    /// # Errors
    /// I/O or serialization failures.
    pub fn export_book(
        &self,
        book: &Book,
        path: impl AsRef<Path>,
        format: ExportFormat,
    ) -> LibraryResult<()> {
        let path = path.as_ref();
        export::export_to_path(book, path, format)?;
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "discovery.book.exported",
                json!({
                    "book_id": book.book_id,
                    "format": format.label(),
                    "path": path.display().to_string(),
                }),
            );
        }
        Ok(())
    }

    /// Renders `book` in `format` without touching the filesystem.
    ///
    /// # Errors
    /// Serialization failures.
    pub fn render_book(&self, book: &Book, format: ExportFormat) -> LibraryResult<String> {
        export::render(book, format)
    }

    /// Cache counters; all zero with `cache_enabled = false` when caching is off.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map_or_else(CacheStats::default, PageCache::stats)
    }

    /// Empties the page cache.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    fn resolve(&self, address: &str) -> LibraryResult<Arc<str>> {
        match &self.cache {
            Some(cache) => {
                cache.get_or_try_insert_with(address, || self.generator.page_from_address(address))
            }
            None => self.generator.page_from_address(address).map(Arc::from),
        }
    }
}

/// One-shot search with a default engine.
#[must_use]
pub fn search_and_discover(query: &str, strategy: SearchStrategy, max_results: usize) -> DiscoveryResult {
    DiscoveryEngine::default().search(query, strategy, max_results, DEFAULT_MIN_COHERENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;
    use shared_logging::MemoryLogger;
    use tempfile::tempdir;

    #[test]
    fn get_page_goes_through_cache() {
        let engine = DiscoveryEngine::default();
        let page = engine.get_page("1a2b3c").unwrap();
        assert!(page.content.starts_with("zwakidnckyjilvws,lsjc,wbkcj"));
        assert_eq!(page.length(), 3200);
        assert!((page.coherence_score - page.scores.composite).abs() < f64::EPSILON);

        let again = engine.get_page("1a2b3c").unwrap();
        assert_eq!(again.content, page.content);
        let stats = engine.cache_stats();
        assert!(stats.cache_enabled);
        assert_eq!(stats.cached_pages, 1);
        assert_eq!(stats.cache_size_bytes, 3200);
        assert_eq!((stats.hits, stats.misses), (1, 1));

        engine.clear_cache();
        assert_eq!(engine.cache_stats().cached_pages, 0);
    }

    #[test]
    fn invalid_address_is_not_cached() {
        let engine = DiscoveryEngine::default();
        assert!(matches!(
            engine.get_page("xyz"),
            Err(LibraryError::InvalidAddress(_))
        ));
        assert_eq!(engine.cache_stats().cached_pages, 0);
    }

    #[test]
    fn cache_can_be_disabled() {
        let engine = DiscoveryEngine::new(30.0, false);
        engine.get_page("abc").unwrap();
        let stats = engine.cache_stats();
        assert!(!stats.cache_enabled);
        assert_eq!(stats.cached_pages, 0);
    }

    #[test]
    fn huge_result_counts_saturate() {
        let engine = DiscoveryEngine::default();
        let result = engine.search_with_window(
            "ab",
            SearchStrategy::Exact,
            usize::MAX / 4,
            0.0,
            Some(SeedWindow::new(0, 200)),
        );
        assert_eq!(result.query.max_candidates, usize::MAX);
        assert!(result.total_candidates > 0);
        assert!(result.pages.len() <= 200);
    }

    #[test]
    fn search_is_ranked_and_deterministic() {
        let first = DiscoveryEngine::default().search("the cat", SearchStrategy::Fragments, 5, 0.0);
        let second = DiscoveryEngine::new(0.0, false).search("the cat", SearchStrategy::Fragments, 5, 0.0);
        assert_eq!(first.query.max_candidates, 25);
        assert!(first.pages.len() <= 5);
        assert!(first.total_candidates >= first.pages.len());
        assert_eq!(first.coherent_pages, first.pages.len());
        for pair in first.pages.windows(2) {
            assert!(pair[0].coherence_score >= pair[1].coherence_score);
        }
        let addresses = |result: &DiscoveryResult| {
            result
                .pages
                .iter()
                .map(|page| page.address.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(addresses(&first), addresses(&second));
        if !first.pages.is_empty() {
            let mean = first.pages.iter().map(|p| p.coherence_score).sum::<f64>()
                / first.pages.len() as f64;
            assert!((first.average_coherence - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn unreachable_threshold_keeps_nothing() {
        let engine = DiscoveryEngine::default();
        let result = engine.search_with_window(
            "ab",
            SearchStrategy::Inversion,
            3,
            100.0,
            Some(SeedWindow::new(0, 400)),
        );
        assert!(result.total_candidates > 0);
        assert!(result.pages.is_empty());
        assert!(result.average_coherence.abs() < f64::EPSILON);
        assert!(result.to_summary().pages.is_empty());
    }

    #[test]
    fn summary_truncates_content() {
        let engine = DiscoveryEngine::default();
        let result = engine.search_with_window(
            "ab",
            SearchStrategy::Inversion,
            2,
            0.0,
            Some(SeedWindow::new(0, 400)),
        );
        let summary = result.to_summary();
        assert_eq!(summary.strategy, SearchStrategy::Inversion);
        assert_eq!(summary.pages.len(), result.pages.len());
        for page in &summary.pages {
            assert_eq!(page.snippet.chars().count(), 103);
            assert!(page.snippet.ends_with("..."));
        }
        assert_eq!(summary_snippet("short"), "short");
    }

    #[test]
    fn assembled_custom_book_uses_query_title() {
        let engine = DiscoveryEngine::default();
        let book = engine
            .assemble_book("the", 4, 0.0, AssemblyMethod::Custom)
            .unwrap()
            .unwrap();
        assert_eq!(book.title, "the");
        assert!(book.page_count() >= 1 && book.page_count() <= 12);
        assert_eq!(book.metadata["custom_title"], json!(true));

        let none = engine
            .assemble_book("the", 4, 100.0, AssemblyMethod::PhraseRelevance)
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn telemetry_records_engine_events() {
        let memory = Arc::new(MemoryLogger::new());
        let telemetry = LibraryTelemetry::builder("babel-library")
            .sink(memory.clone())
            .build()
            .unwrap();
        let engine = DiscoveryEngine::default().with_telemetry(telemetry);
        engine.get_page("1").unwrap();
        let _ = engine.search("hello", SearchStrategy::Fragments, 2, 0.0);
        let messages = memory.messages();
        assert_eq!(messages[0], "discovery.page.lookup");
        assert!(messages.contains(&"discovery.search.start".to_string()));
        assert!(messages.contains(&"discovery.search.complete".to_string()));
    }

    #[test]
    fn export_and_render_agree() {
        let engine = DiscoveryEngine::default();
        let pages = vec![engine.get_page("1").unwrap(), engine.get_page("2").unwrap()];
        let book = BookAssembler::default()
            .assemble_custom(pages, "Pair", None)
            .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("pair.json");
        engine.export_book(&book, &path, ExportFormat::Metadata).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, engine.render_book(&book, ExportFormat::Metadata).unwrap());
        assert!(!written.contains(&book.pages[0].content));
    }

    #[test]
    fn config_drives_engine_settings() {
        let dir = tempdir().unwrap();
        let config = DiscoveryConfig {
            min_coherence: 10.0,
            cache_enabled: false,
            default_book_size: 6,
            coherent_threshold: 40.0,
            log_path: Some(dir.path().join("engine.jsonl")),
            log_level: "debug".into(),
            ..DiscoveryConfig::default()
        };
        let engine = DiscoveryEngine::from_config(&config).unwrap();
        assert!((engine.min_coherence() - 10.0).abs() < f64::EPSILON);
        assert_eq!(engine.default_book_size(), 6);
        assert!((engine.decoder().coherent_threshold() - 40.0).abs() < f64::EPSILON);
        assert!(!engine.cache_stats().cache_enabled);
        engine.get_page("1").unwrap();
        let log = std::fs::read_to_string(dir.path().join("engine.jsonl")).unwrap();
        assert!(log.contains("discovery.page.lookup"));

        let invalid = DiscoveryConfig {
            default_book_size: 0,
            ..DiscoveryConfig::default()
        };
        assert!(DiscoveryEngine::from_config(&invalid).is_err());
    }
}
