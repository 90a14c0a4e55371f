use std::{fmt, fs, path::Path, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::book::{AssemblyMethod, Book, Page};
use crate::coherence::CoherenceScores;
use crate::error::{LibraryError, LibraryResult};

/// Output form of an exported book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Plain text with a header block.
    Text,
    /// Pretty JSON including page content.
    Json,
    /// Pretty JSON with page content stripped.
    Metadata,
}

impl ExportFormat {
    /// Stable name of the format.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExportFormat {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "metadata" => Ok(Self::Metadata),
            other => Err(LibraryError::UnknownExportFormat(other.to_string())),
        }
    }
}

/// Serialized view of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    /// Page address.
    pub address: String,
    /// Composite coherence.
    pub coherence_score: f64,
    /// Named sub-scores.
    pub scores: CoherenceScores,
    /// Short content hash.
    pub page_hash: String,
    /// Content length in characters.
    pub length: usize,
    /// Full content, absent in metadata exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PageDocument {
    fn from_page(page: &Page, with_content: bool) -> Self {
        Self {
            address: page.address.clone(),
            coherence_score: page.coherence_score,
            scores: page.scores,
            page_hash: page.page_hash(),
            length: page.length(),
            content: with_content.then(|| page.content.clone()),
        }
    }
}

/// Serialized view of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    /// Book id.
    pub book_id: String,
    /// Display title.
    pub title: String,
    /// Number of pages.
    pub page_count: usize,
    /// Total characters.
    pub total_length: usize,
    /// Mean page coherence.
    pub coherence_score: f64,
    /// Assembly policy.
    pub assembly_method: AssemblyMethod,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Per-page entries in book order.
    pub pages: Vec<PageDocument>,
    /// Policy-specific details.
    pub metadata: IndexMap<String, Value>,
}

impl BookDocument {
    /// Builds the document, optionally keeping page content.
    #[must_use]
    pub fn from_book(book: &Book, with_content: bool) -> Self {
        Self {
            book_id: book.book_id.clone(),
            title: book.title.clone(),
            page_count: book.page_count(),
            total_length: book.total_length(),
            coherence_score: book.coherence_score,
            assembly_method: book.assembly_method,
            created_at: book.created_at.to_rfc3339(),
            pages: book
                .pages
                .iter()
                .map(|page| PageDocument::from_page(page, with_content))
                .collect(),
            metadata: book.metadata.clone(),
        }
    }
}

/// Plain-text rendering; the header block is skipped when `include_metadata` is false.
#[must_use]
pub fn export_text(book: &Book, include_metadata: bool) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(book.page_count() * 3 + 9);
    if include_metadata {
        lines.push(format!("# {}", book.title));
        lines.push(format!("Book ID: {}", book.book_id));
        lines.push(format!("Pages: {}", book.page_count()));
        lines.push(format!("Coherence: {:.2}", book.coherence_score));
        lines.push(format!("Assembly Method: {}", book.assembly_method));
        lines.push(format!("Created: {}", book.created_at.to_rfc3339()));
        lines.push(String::new());
        lines.push("=".repeat(80));
        lines.push(String::new());
    }
    for (index, page) in book.pages.iter().enumerate() {
        lines.push(format!("--- Page {} (Address: {}) ---", index + 1, page.address));
        lines.push(page.content.clone());
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Renders `book` in `format`.
///
/// # Errors
/// [`LibraryError::Serialization`] if JSON encoding fails.
pub fn render(book: &Book, format: ExportFormat) -> LibraryResult<String> {
    match format {
        ExportFormat::Text => Ok(export_text(book, true)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&BookDocument::from_book(book, true))?),
        ExportFormat::Metadata => {
            Ok(serde_json::to_string_pretty(&BookDocument::from_book(book, false))?)
        }
    }
}

/// Writes the rendering of `book` to `path`, creating parent directories.
///
/// # Errors
/// [`LibraryError::Io`] on filesystem failures, [`LibraryError::Serialization`] on encoding.
pub fn export_to_path(book: &Book, path: impl AsRef<Path>, format: ExportFormat) -> LibraryResult<()> {
    let path = path.as_ref();
    let rendered = render(book, format)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn book() -> Book {
        Book::assemble(
            "Export Test",
            vec![Page::new("1", "page one", 40.0), Page::new("2", "page two", 60.0)],
            AssemblyMethod::Custom,
            Some("abc123".into()),
            IndexMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn text_has_header_and_page_blocks() {
        let text = export_text(&book(), true);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Export Test");
        assert_eq!(lines[1], "Book ID: abc123");
        assert_eq!(lines[2], "Pages: 2");
        assert_eq!(lines[3], "Coherence: 50.00");
        assert_eq!(lines[4], "Assembly Method: custom");
        assert!(lines[5].starts_with("Created: "));
        assert_eq!(lines[7], "=".repeat(80));
        assert_eq!(lines[9], "--- Page 1 (Address: 1) ---");
        assert_eq!(lines[10], "page one");

        let bare = export_text(&book(), false);
        assert!(bare.starts_with("--- Page 1 (Address: 1) ---\npage one\n"));
        assert!(bare.ends_with("page two\n"));
    }

    #[test]
    fn metadata_strips_content() {
        let json: Value = serde_json::from_str(&render(&book(), ExportFormat::Metadata).unwrap()).unwrap();
        assert_eq!(json["page_count"], 2);
        assert_eq!(json["pages"][0]["length"], 8);
        assert!(json["pages"][0].get("content").is_none());
        assert_eq!(json["pages"][0]["page_hash"].as_str().unwrap().len(), 16);

        let full: BookDocument =
            serde_json::from_str(&render(&book(), ExportFormat::Json).unwrap()).unwrap();
        assert_eq!(full.pages[1].content.as_deref(), Some("page two"));
        assert_eq!(full.assembly_method, AssemblyMethod::Custom);
    }

    #[test]
    fn export_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("book.txt");
        let book = book();
        export_to_path(&book, &path, ExportFormat::Text).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, export_text(&book, true));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(LibraryError::UnknownExportFormat(name)) if name == "pdf"
        ));
    }
}
