#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Deterministic combinatorial library: every hex address names one 3200-character
//! page, computed on demand. Includes phrase search over synthesized candidates,
//! heuristic coherence scoring, and assembly of ranked pages into books.

/// Hex address parsing and numeric ordering.
#[path = "../address.rs"]
pub mod address;

/// Library error type.
#[path = "../error.rs"]
pub mod error;

/// Page generation and substring scans.
#[path = "../generator.rs"]
pub mod generator;

/// Search strategies.
#[path = "../searcher.rs"]
pub mod searcher;

/// Coherence scoring and page decoding.
#[path = "../coherence/main.rs"]
pub mod coherence;

/// Book assembly and export.
#[path = "../assembler/main.rs"]
pub mod assembler;

/// Engine page cache.
#[path = "../cache.rs"]
pub mod cache;

/// TOML configuration.
#[path = "../config.rs"]
pub mod config;

/// Telemetry helpers.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// JSON request/response facade.
#[path = "../api.rs"]
pub mod api;

/// High-level orchestration entry point.
#[path = "../main.rs"]
pub mod orchestration_entry;

pub use api::{
    ApiResponse, AssembleRequest, DiscoveryApi, PageView, SearchRequest, MAX_REQUEST_BOOK_SIZE,
    MAX_REQUEST_CANDIDATES,
};
pub use assembler::{
    export_text, export_to_path, rank_by_coherence, render, AssemblyMethod, AssemblyPlan, Book,
    BookAssembler, BookDocument, ExportFormat, Page,
};
pub use cache::{CacheStats, PageCache};
pub use coherence::{
    is_coherent, score_page, CoherenceScorer, CoherenceScores, EnglishDictionary, PageDecoder,
    Passage,
};
pub use config::DiscoveryConfig;
pub use error::{LibraryError, LibraryResult};
pub use generator::{generate_page, PageGenerator, SeedWindow, SubstringMatch, PAGE_LENGTH};
pub use orchestration_entry::{
    search_and_discover, DiscoveryEngine, DiscoveryQuery, DiscoveryResult, DiscoverySummary,
};
pub use searcher::{rank_hits, search_babel, SearchHit, SearchStrategy, Searcher};
pub use telemetry::{LibraryTelemetry, LibraryTelemetryBuilder};
