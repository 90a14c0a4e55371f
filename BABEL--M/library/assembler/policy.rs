use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::book::{rank_by_coherence, AssemblyMethod, Book, Page};
use crate::address::{address_span, compare_addresses, numeric_value};
use crate::error::LibraryResult;

/// Pages per book when the caller does not say otherwise.
pub const DEFAULT_BOOK_SIZE: usize = 32;
/// Fewest pages a coherence-threshold book may hold.
const MIN_THRESHOLD_BOOK: usize = 3;

/// Policy plus its parameters, for dispatching through [`BookAssembler::assemble`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AssemblyPlan {
    /// Group by numeric address.
    AddressAdjacency {
        /// Pages per book.
        #[serde(default)]
        book_size: Option<usize>,
    },
    /// Group pages at or above a coherence threshold.
    CoherenceThreshold {
        /// Minimum page coherence.
        #[serde(default = "default_min_coherence")]
        min_coherence: f64,
        /// Pages per book.
        #[serde(default)]
        book_size: Option<usize>,
    },
    /// Rank by relevance to one phrase.
    PhraseRelevance {
        /// Phrase to rank against.
        target_phrase: String,
        /// Pages per book.
        #[serde(default)]
        book_size: Option<usize>,
    },
    /// Wrap caller pages verbatim.
    Custom {
        /// Book title.
        title: String,
        /// Explicit id; derived from the pages when absent.
        #[serde(default)]
        book_id: Option<String>,
    },
}

impl AssemblyPlan {
    /// Method implemented by this plan.
    #[must_use]
    pub const fn method(&self) -> AssemblyMethod {
        match self {
            Self::AddressAdjacency { .. } => AssemblyMethod::AddressAdjacency,
            Self::CoherenceThreshold { .. } => AssemblyMethod::CoherenceThreshold,
            Self::PhraseRelevance { .. } => AssemblyMethod::PhraseRelevance,
            Self::Custom { .. } => AssemblyMethod::Custom,
        }
    }
}

/// Groups scored pages into books.
#[derive(Debug, Clone, Copy)]
pub struct BookAssembler {
    default_book_size: usize,
}

impl Default for BookAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_BOOK_SIZE)
    }
}

impl BookAssembler {
    /// Creates an assembler; a zero size falls back to [`DEFAULT_BOOK_SIZE`].
    #[must_use]
    pub fn new(default_book_size: usize) -> Self {
        Self {
            default_book_size: if default_book_size == 0 {
                DEFAULT_BOOK_SIZE
            } else {
                default_book_size
            },
        }
    }

    /// Configured default book size.
    #[must_use]
    pub const fn default_book_size(&self) -> usize {
        self.default_book_size
    }

    fn size(&self, book_size: Option<usize>) -> usize {
        book_size
            .filter(|size| *size > 0)
            .unwrap_or(self.default_book_size)
    }

    /// Runs `plan`, returning the first book it produces.
    ///
    /// # Errors
    /// Malformed addresses under address adjacency, and empty custom books.
    pub fn assemble(&self, pages: Vec<Page>, plan: AssemblyPlan) -> LibraryResult<Option<Book>> {
        match plan {
            AssemblyPlan::AddressAdjacency { book_size } => Ok(self
                .assemble_by_address_adjacency(&pages, book_size)?
                .into_iter()
                .next()),
            AssemblyPlan::CoherenceThreshold {
                min_coherence,
                book_size,
            } => Ok(self
                .assemble_by_coherence_threshold(&pages, min_coherence, book_size)?
                .into_iter()
                .next()),
            AssemblyPlan::PhraseRelevance {
                target_phrase,
                book_size,
            } => self.assemble_by_phrase_relevance(&pages, &target_phrase, book_size),
            AssemblyPlan::Custom { title, book_id } => {
                self.assemble_custom(pages, title, book_id).map(Some)
            }
        }
    }

    /// Books of numerically consecutive addresses.
    ///
    /// A trailing chunk shorter than half the book size is dropped.
    ///
    /// # Errors
    /// [`crate::LibraryError::InvalidAddress`] if any page address is not hex.
    pub fn assemble_by_address_adjacency(
        &self,
        pages: &[Page],
        book_size: Option<usize>,
    ) -> LibraryResult<Vec<Book>> {
        let book_size = self.size(book_size);
        for page in pages {
            numeric_value(&page.address)?;
        }
        let mut sorted = pages.to_vec();
        sorted.sort_by(|a, b| compare_addresses(&a.address, &b.address));

        let mut books = Vec::new();
        for chunk in sorted.chunks(book_size) {
            if chunk.len() < book_size / 2 {
                continue;
            }
            let first = chunk[0].address.clone();
            let last = chunk[chunk.len() - 1].address.clone();
            let span = address_span(chunk.iter().map(|page| page.address.as_str()))?;
            let title = format!("Book at Address {}...", prefix_chars(&first, 8));
            let metadata = metadata([
                ("first_address", json!(first)),
                ("last_address", json!(last)),
                ("address_range", json!(span)),
            ]);
            books.push(Book::assemble(
                title,
                chunk.to_vec(),
                AssemblyMethod::AddressAdjacency,
                None,
                metadata,
            )?);
        }
        Ok(books)
    }

    /// Books of pages at or above `min_coherence`, best first; chunks under three pages are dropped.
    ///
    /// # Errors
    /// Never fails in practice; the result type matches the other policies.
    pub fn assemble_by_coherence_threshold(
        &self,
        pages: &[Page],
        min_coherence: f64,
        book_size: Option<usize>,
    ) -> LibraryResult<Vec<Book>> {
        let book_size = self.size(book_size);
        let mut coherent: Vec<Page> = pages
            .iter()
            .filter(|page| page.coherence_score >= min_coherence)
            .cloned()
            .collect();
        rank_by_coherence(&mut coherent);

        let mut books = Vec::new();
        for chunk in coherent.chunks(book_size) {
            if chunk.len() < MIN_THRESHOLD_BOOK {
                continue;
            }
            let mean = chunk.iter().map(|page| page.coherence_score).sum::<f64>() / chunk.len() as f64;
            let metadata = metadata([
                ("min_coherence", json!(min_coherence)),
                (
                    "page_scores",
                    json!(chunk.iter().map(|page| page.coherence_score).collect::<Vec<_>>()),
                ),
            ]);
            books.push(Book::assemble(
                format!("Coherent Collection (Score: {mean:.1})"),
                chunk.to_vec(),
                AssemblyMethod::CoherenceThreshold,
                None,
                metadata,
            )?);
        }
        Ok(books)
    }

    /// One book of the pages most relevant to `target_phrase`, or `None` for no pages.
    ///
    /// Relevance is `100 × phrase occurrences + 10 × word occurrences + coherence`.
    ///
    /// # Errors
    /// Never fails in practice; the result type matches the other policies.
    pub fn assemble_by_phrase_relevance(
        &self,
        pages: &[Page],
        target_phrase: &str,
        book_size: Option<usize>,
    ) -> LibraryResult<Option<Book>> {
        if pages.is_empty() {
            return Ok(None);
        }
        let book_size = self.size(book_size);
        let phrase = target_phrase.to_lowercase();
        let words: Vec<&str> = phrase.split_whitespace().collect();

        let mut ranked: Vec<(f64, &Page)> = pages
            .iter()
            .map(|page| (phrase_relevance(page, &phrase, &words), page))
            .collect();
        ranked.sort_by(|(ra, pa), (rb, pb)| {
            rb.total_cmp(ra)
                .then_with(|| compare_addresses(&pa.address, &pb.address))
        });

        let top_relevance = ranked[0].0;
        let top: Vec<Page> = ranked
            .into_iter()
            .take(book_size)
            .map(|(_, page)| page.clone())
            .collect();
        let metadata = metadata([
            ("target_phrase", json!(target_phrase)),
            ("top_relevance_score", json!(top_relevance)),
        ]);
        Book::assemble(
            format!("Collection: \"{}...\"", prefix_chars(target_phrase, 50)),
            top,
            AssemblyMethod::PhraseRelevance,
            None,
            metadata,
        )
        .map(Some)
    }

    /// Wraps caller pages verbatim.
    ///
    /// # Errors
    /// [`crate::LibraryError::EmptyBook`] when `pages` is empty.
    pub fn assemble_custom(
        &self,
        pages: Vec<Page>,
        title: impl Into<String>,
        book_id: Option<String>,
    ) -> LibraryResult<Book> {
        Book::assemble(
            title,
            pages,
            AssemblyMethod::Custom,
            book_id,
            metadata([("custom_title", json!(true))]),
        )
    }
}

const fn default_min_coherence() -> f64 {
    crate::coherence::COHERENT_THRESHOLD
}

fn phrase_relevance(page: &Page, phrase: &str, words: &[&str]) -> f64 {
    let content = page.content.to_lowercase();
    let exact = content.matches(phrase).count();
    let word_hits: usize = words.iter().map(|word| content.matches(word).count()).sum();
    (exact * 100 + word_hits * 10) as f64 + page.coherence_score
}

fn prefix_chars(text: &str, count: usize) -> &str {
    text.char_indices()
        .nth(count)
        .map_or(text, |(index, _)| &text[..index])
}

fn metadata<const N: usize>(entries: [(&str, Value); N]) -> IndexMap<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;

    fn sample_pages() -> Vec<Page> {
        vec![
            Page::new("a", "test1 ".repeat(100), 60.0),
            Page::new("b", "test2 ".repeat(100), 70.0),
            Page::new("c", "test3 ".repeat(100), 80.0),
        ]
    }

    #[test]
    fn custom_requires_pages() {
        let assembler = BookAssembler::default();
        let err = assembler.assemble_custom(Vec::new(), "x", None).unwrap_err();
        assert!(matches!(err, LibraryError::EmptyBook));

        let book = assembler
            .assemble_custom(sample_pages(), "My Book", None)
            .unwrap();
        assert_eq!(book.page_count(), 3);
        assert_eq!(book.title, "My Book");
        assert_eq!(book.assembly_method, AssemblyMethod::Custom);
        assert_eq!(book.pages[0].address, "a");
        assert_eq!(book.metadata["custom_title"], json!(true));

        let named = assembler
            .assemble_custom(sample_pages(), "Named", Some("fixed-id".into()))
            .unwrap();
        assert_eq!(named.book_id, "fixed-id");
    }

    #[test]
    fn adjacency_sorts_numerically_and_drops_short_tail() {
        let assembler = BookAssembler::default();
        let pages: Vec<Page> = ["10", "2", "ff", "1", "a"]
            .iter()
            .map(|address| Page::new(*address, "content", 40.0))
            .collect();
        let books = assembler
            .assemble_by_address_adjacency(&pages, Some(2))
            .unwrap();
        assert_eq!(books.len(), 3);
        let order: Vec<&str> = books
            .iter()
            .flat_map(|book| book.pages.iter().map(|page| page.address.as_str()))
            .collect();
        assert_eq!(order, vec!["1", "2", "a", "10", "ff"]);
        assert_eq!(books[1].metadata["address_range"], json!("6"));
        assert_eq!(books[0].title, "Book at Address 1...");

        let strict = assembler
            .assemble_by_address_adjacency(&pages, Some(4))
            .unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].metadata["first_address"], json!("1"));
        assert_eq!(strict[0].metadata["last_address"], json!("10"));
    }

    #[test]
    fn adjacency_rejects_malformed_addresses() {
        let assembler = BookAssembler::default();
        let pages = vec![Page::new("zz", "x", 1.0)];
        assert!(matches!(
            assembler.assemble_by_address_adjacency(&pages, None),
            Err(LibraryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn threshold_filters_sorts_and_requires_three() {
        let assembler = BookAssembler::default();
        let books = assembler
            .assemble_by_coherence_threshold(&sample_pages(), 50.0, Some(10))
            .unwrap();
        assert_eq!(books.len(), 1);
        let scores: Vec<f64> = books[0].pages.iter().map(|p| p.coherence_score).collect();
        assert_eq!(scores, vec![80.0, 70.0, 60.0]);
        assert_eq!(books[0].title, "Coherent Collection (Score: 70.0)");

        let too_few = assembler
            .assemble_by_coherence_threshold(&sample_pages(), 65.0, Some(10))
            .unwrap();
        assert!(too_few.is_empty());
    }

    #[test]
    fn threshold_ties_keep_numeric_address_order() {
        let pages = vec![
            Page::new("100", "same", 60.0),
            Page::new("ff", "same", 60.0),
            Page::new("2", "same", 60.0),
            Page::new("1000", "same", 90.0),
        ];
        let books = BookAssembler::default()
            .assemble_by_coherence_threshold(&pages, 50.0, Some(10))
            .unwrap();
        let order: Vec<&str> = books[0].pages.iter().map(|p| p.address.as_str()).collect();
        assert_eq!(order, ["1000", "2", "ff", "100"]);
    }

    #[test]
    fn phrase_relevance_ties_keep_numeric_address_order() {
        let pages = vec![
            Page::new("100", "the cat sat", 40.0),
            Page::new("ff", "the cat sat", 40.0),
            Page::new("2", "the cat sat", 40.0),
        ];
        let book = BookAssembler::default()
            .assemble_by_phrase_relevance(&pages, "cat", Some(3))
            .unwrap()
            .unwrap();
        let order: Vec<&str> = book.pages.iter().map(|p| p.address.as_str()).collect();
        assert_eq!(order, ["2", "ff", "100"]);
    }

    #[test]
    fn phrase_relevance_ranks_by_occurrences() {
        let assembler = BookAssembler::default();
        let book = assembler
            .assemble_by_phrase_relevance(&sample_pages(), "test2", Some(2))
            .unwrap()
            .unwrap();
        assert_eq!(book.page_count(), 2);
        assert_eq!(book.pages[0].address, "b");
        assert_eq!(book.metadata["top_relevance_score"], json!(11070.0));
        assert_eq!(book.title, "Collection: \"test2...\"");

        assert!(assembler
            .assemble_by_phrase_relevance(&[], "test", None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn plans_deserialize_with_defaults() {
        let plan: AssemblyPlan =
            serde_json::from_value(json!({ "method": "coherence_threshold" })).unwrap();
        assert_eq!(
            plan,
            AssemblyPlan::CoherenceThreshold {
                min_coherence: 50.0,
                book_size: None
            }
        );
        assert_eq!(plan.method(), AssemblyMethod::CoherenceThreshold);
    }

    #[test]
    fn dispatch_returns_first_book() {
        let assembler = BookAssembler::new(0);
        assert_eq!(assembler.default_book_size(), DEFAULT_BOOK_SIZE);
        let book = assembler
            .assemble(
                sample_pages(),
                AssemblyPlan::CoherenceThreshold {
                    min_coherence: 0.0,
                    book_size: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(book.assembly_method, AssemblyMethod::CoherenceThreshold);

        let none = assembler
            .assemble(
                sample_pages(),
                AssemblyPlan::AddressAdjacency { book_size: Some(8) },
            )
            .unwrap();
        assert!(none.is_none());
        assert!(matches!(
            assembler.assemble(
                Vec::new(),
                AssemblyPlan::Custom {
                    title: "t".into(),
                    book_id: None
                }
            ),
            Err(LibraryError::EmptyBook)
        ));
    }
}
