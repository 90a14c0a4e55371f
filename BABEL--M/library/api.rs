//! Request/response facade for embedding the engine behind a JSON service.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    assembler::{AssemblyMethod, Book, BookDocument},
    coherence::CoherenceScores,
    orchestration_entry::{DiscoveryEngine, DiscoverySummary},
    searcher::SearchStrategy,
};

/// Largest `maxCandidates` a search request may ask for.
pub const MAX_REQUEST_CANDIDATES: usize = 1_000;
/// Largest `book_size` an assembly request may ask for.
pub const MAX_REQUEST_BOOK_SIZE: usize = 256;

/// Body of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Query text.
    #[serde(default)]
    pub query: String,
    /// Strategy name.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Number of results wanted.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Minimum composite.
    #[serde(default = "default_min_coherence")]
    pub min_coherence: f64,
}

/// Body of an assembly request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembleRequest {
    /// Query text.
    #[serde(default)]
    pub query: String,
    /// Pages per book.
    #[serde(default = "default_book_size")]
    pub book_size: usize,
    /// Minimum composite for candidate pages.
    #[serde(default = "default_coherence_threshold")]
    pub coherence_threshold: f64,
    /// Assembly method name.
    #[serde(default = "default_assembly_method")]
    pub assembly_method: String,
}

/// Page payload of a page lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    /// Page address.
    pub address: String,
    /// Full content.
    pub content: String,
    /// Composite coherence.
    pub coherence_score: f64,
    /// Named sub-scores.
    pub scores: CoherenceScores,
    /// Short content hash.
    pub page_hash: String,
}

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Engine facade with a registry of assembled books.
#[derive(Debug, Default)]
pub struct DiscoveryApi {
    engine: DiscoveryEngine,
    books: RwLock<IndexMap<String, Book>>,
}

impl DiscoveryApi {
    /// Wraps an engine.
    #[must_use]
    pub fn new(engine: DiscoveryEngine) -> Self {
        Self {
            engine,
            books: RwLock::new(IndexMap::new()),
        }
    }

    /// Underlying engine.
    #[must_use]
    pub const fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    /// Runs a search and returns its summary.
    #[must_use]
    pub fn post_search(&self, request: &SearchRequest) -> ApiResponse<DiscoverySummary> {
        if request.max_candidates > MAX_REQUEST_CANDIDATES {
            return ApiResponse::fail(format!(
                "maxCandidates must be at most {MAX_REQUEST_CANDIDATES}"
            ));
        }
        let strategy = match request.strategy.parse::<SearchStrategy>() {
            Ok(strategy) => strategy,
            Err(err) => return ApiResponse::fail(err.to_string()),
        };
        let result = self.engine.search(
            &request.query,
            strategy,
            request.max_candidates,
            request.min_coherence,
        );
        ApiResponse::ok(result.to_summary())
    }

    /// Looks up one page.
    #[must_use]
    pub fn get_page(&self, address: &str) -> ApiResponse<PageView> {
        match self.engine.get_page(address) {
            Ok(page) => ApiResponse::ok(PageView {
                page_hash: page.page_hash(),
                address: page.address,
                content: page.content,
                coherence_score: page.coherence_score,
                scores: page.scores,
            }),
            Err(_) => ApiResponse::fail("Invalid address or page not found"),
        }
    }

    /// Assembles a book, registers it, and returns its metadata document.
    #[must_use]
    pub fn post_assemble(&self, request: &AssembleRequest) -> ApiResponse<BookDocument> {
        if request.book_size > MAX_REQUEST_BOOK_SIZE {
            return ApiResponse::fail(format!(
                "book_size must be at most {MAX_REQUEST_BOOK_SIZE}"
            ));
        }
        let method = match request.assembly_method.parse::<AssemblyMethod>() {
            Ok(method) => method,
            Err(err) => return ApiResponse::fail(err.to_string()),
        };
        match self.engine.assemble_book(
            &request.query,
            request.book_size,
            request.coherence_threshold,
            method,
        ) {
            Ok(Some(book)) => {
                let document = BookDocument::from_book(&book, false);
                self.books.write().insert(book.book_id.clone(), book);
                ApiResponse::ok(document)
            }
            Ok(None) => ApiResponse::fail("No coherent pages found for assembly"),
            Err(err) => ApiResponse::fail(err.to_string()),
        }
    }

    /// Metadata document of a registered book.
    #[must_use]
    pub fn get_book(&self, book_id: &str) -> ApiResponse<BookDocument> {
        self.books.read().get(book_id).map_or_else(
            || ApiResponse::fail("Book not found"),
            |book| ApiResponse::ok(BookDocument::from_book(book, false)),
        )
    }

    /// Registered book, if any.
    #[must_use]
    pub fn book(&self, book_id: &str) -> Option<Book> {
        self.books.read().get(book_id).cloned()
    }
}

fn default_strategy() -> String {
    SearchStrategy::default().label().to_string()
}

const fn default_max_candidates() -> usize {
    50
}

const fn default_min_coherence() -> f64 {
    crate::orchestration_entry::DEFAULT_MIN_COHERENCE
}

const fn default_book_size() -> usize {
    crate::assembler::DEFAULT_BOOK_SIZE
}

const fn default_coherence_threshold() -> f64 {
    crate::coherence::COHERENT_THRESHOLD
}

fn default_assembly_method() -> String {
    AssemblyMethod::PhraseRelevance.label().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn search_request_accepts_camel_case() {
        let request: SearchRequest = serde_json::from_value(json!({
            "query": "hello world",
            "maxCandidates": 3,
            "minCoherence": 0.0
        }))
        .unwrap();
        assert_eq!(request.strategy, "fragments");
        let api = DiscoveryApi::default();
        let response = api.post_search(&request);
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data.query, "hello world");
        assert!(data.pages.len() <= 3);
    }

    #[test]
    fn unknown_strategy_is_an_error_response() {
        let api = DiscoveryApi::default();
        let request: SearchRequest =
            serde_json::from_value(json!({ "query": "x", "strategy": "fuzzy" })).unwrap();
        let response = api.post_search(&request);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("fuzzy"));
    }

    #[test]
    fn oversized_requests_are_error_responses() {
        let api = DiscoveryApi::default();
        let search: SearchRequest = serde_json::from_value(json!({
            "query": "hello",
            "maxCandidates": usize::MAX / 4
        }))
        .unwrap();
        let response = api.post_search(&search);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("maxCandidates"));

        let assemble = api.post_assemble(&AssembleRequest {
            query: "the".into(),
            book_size: usize::MAX / 4,
            coherence_threshold: 0.0,
            assembly_method: "custom".into(),
        });
        assert!(!assemble.success);
        assert!(assemble.error.unwrap().contains("book_size"));

        let at_cap = api.post_search(&SearchRequest {
            query: "hello".into(),
            strategy: "fragments".into(),
            max_candidates: MAX_REQUEST_CANDIDATES,
            min_coherence: 100.0,
        });
        assert!(at_cap.success);
    }

    #[test]
    fn page_lookup_envelopes() {
        let api = DiscoveryApi::default();
        let found = api.get_page("1a2b3c");
        assert!(found.success);
        let page = found.data.unwrap();
        assert_eq!(page.content.len(), 3200);
        assert_eq!(page.page_hash.len(), 16);

        let missing = api.get_page("not hex");
        let json: Value = serde_json::to_value(&missing).unwrap();
        assert_eq!(json, json!({ "success": false, "error": "Invalid address or page not found" }));
    }

    #[test]
    fn assembled_books_are_registered() {
        let api = DiscoveryApi::default();
        let request: AssembleRequest = serde_json::from_value(json!({
            "query": "the",
            "book_size": 4,
            "coherence_threshold": 0.0,
            "assembly_method": "custom"
        }))
        .unwrap();
        let response = api.post_assemble(&request);
        assert!(response.success);
        let document = response.data.unwrap();
        assert_eq!(document.title, "the");
        assert!(document.pages.iter().all(|page| page.content.is_none()));

        let fetched = api.get_book(&document.book_id);
        assert_eq!(fetched.data.unwrap().book_id, document.book_id);
        assert!(api.book(&document.book_id).is_some());
        assert!(!api.get_book("missing").success);
    }

    #[test]
    fn assembly_failures_are_error_responses() {
        let api = DiscoveryApi::default();
        let unknown = api.post_assemble(&AssembleRequest {
            query: "the".into(),
            book_size: 4,
            coherence_threshold: 0.0,
            assembly_method: "shelf".into(),
        });
        assert!(unknown.error.unwrap().contains("shelf"));

        let empty = api.post_assemble(&AssembleRequest {
            query: "the".into(),
            book_size: 4,
            coherence_threshold: 100.0,
            assembly_method: "phrase_relevance".into(),
        });
        assert_eq!(empty.error.as_deref(), Some("No coherent pages found for assembly"));
    }
}
