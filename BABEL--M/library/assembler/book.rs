use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::compare_addresses;
use crate::coherence::CoherenceScores;
use crate::error::LibraryError;

/// Policy that grouped a book's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMethod {
    /// Consecutive numeric addresses.
    AddressAdjacency,
    /// Pages above a coherence threshold, best first.
    CoherenceThreshold,
    /// Pages ranked by relevance to a phrase.
    PhraseRelevance,
    /// Caller-selected pages.
    Custom,
}

impl AssemblyMethod {
    /// Stable name of the method.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AddressAdjacency => "address_adjacency",
            Self::CoherenceThreshold => "coherence_threshold",
            Self::PhraseRelevance => "phrase_relevance",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for AssemblyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssemblyMethod {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "address_adjacency" => Ok(Self::AddressAdjacency),
            "coherence_threshold" => Ok(Self::CoherenceThreshold),
            "phrase_relevance" => Ok(Self::PhraseRelevance),
            "custom" => Ok(Self::Custom),
            other => Err(LibraryError::UnknownAssemblyMethod(other.to_string())),
        }
    }
}

/// A page with its coherence scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Hex address.
    pub address: String,
    /// Page text.
    pub content: String,
    /// Composite coherence in `[0, 100]`.
    pub coherence_score: f64,
    /// Named sub-scores.
    #[serde(default)]
    pub scores: CoherenceScores,
    /// When the page was resolved.
    pub retrieved_at: DateTime<Utc>,
}

impl Page {
    /// Creates a page with a known composite and no sub-scores.
    #[must_use]
    pub fn new(address: impl Into<String>, content: impl Into<String>, coherence_score: f64) -> Self {
        Self {
            address: address.into(),
            content: content.into(),
            coherence_score,
            scores: CoherenceScores::default(),
            retrieved_at: Utc::now(),
        }
    }

    /// Creates a page whose composite comes from `scores`.
    #[must_use]
    pub fn scored(address: impl Into<String>, content: impl Into<String>, scores: CoherenceScores) -> Self {
        Self {
            coherence_score: scores.composite,
            scores,
            ..Self::new(address, content, 0.0)
        }
    }

    /// First 16 hex characters of the SHA-256 of the content.
    #[must_use]
    pub fn page_hash(&self) -> String {
        let digest = Sha256::digest(self.content.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Content length in characters.
    #[must_use]
    pub fn length(&self) -> usize {
        self.content.chars().count()
    }
}

/// Immutable anthology of pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Identifier derived from the leading page addresses.
    pub book_id: String,
    /// Display title.
    pub title: String,
    /// Ordered pages (never empty).
    pub pages: Vec<Page>,
    /// Mean page coherence.
    pub coherence_score: f64,
    /// Policy that produced the book.
    pub assembly_method: AssemblyMethod,
    /// Assembly time.
    pub created_at: DateTime<Utc>,
    /// Policy-specific details.
    #[serde(default)]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl Book {
    /// Builds a book, deriving id (unless given) and mean coherence from the pages.
    ///
    /// # Errors
    /// Returns [`LibraryError::EmptyBook`] when `pages` is empty.
    pub fn assemble(
        title: impl Into<String>,
        pages: Vec<Page>,
        assembly_method: AssemblyMethod,
        book_id: Option<String>,
        metadata: IndexMap<String, serde_json::Value>,
    ) -> Result<Self, LibraryError> {
        if pages.is_empty() {
            return Err(LibraryError::EmptyBook);
        }
        let coherence_score =
            pages.iter().map(|page| page.coherence_score).sum::<f64>() / pages.len() as f64;
        Ok(Self {
            book_id: book_id.unwrap_or_else(|| book_id_for(&pages)),
            title: title.into(),
            pages,
            coherence_score,
            assembly_method,
            created_at: Utc::now(),
            metadata,
        })
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total characters across all pages.
    #[must_use]
    pub fn total_length(&self) -> usize {
        self.pages.iter().map(Page::length).sum()
    }
}

/// Orders pages by coherence descending, then by numeric address ascending.
pub fn rank_by_coherence(pages: &mut [Page]) {
    pages.sort_by(|a, b| {
        b.coherence_score
            .total_cmp(&a.coherence_score)
            .then_with(|| compare_addresses(&a.address, &b.address))
    });
}

/// Book id: first 16 hex characters of SHA-256 over the first five addresses.
#[must_use]
pub fn book_id_for(pages: &[Page]) -> String {
    let mut hasher = Sha256::new();
    for page in pages.iter().take(5) {
        hasher.update(page.address.as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}
