//! Book assembly and export.

/// Grouping policies.
pub mod policy;
/// Book and page records.
pub mod book;
/// Text and JSON renderings.
pub mod export;

pub use policy::{AssemblyPlan, BookAssembler, DEFAULT_BOOK_SIZE};
pub use book::{book_id_for, rank_by_coherence, AssemblyMethod, Book, Page};
pub use export::{export_text, export_to_path, render, BookDocument, ExportFormat, PageDocument};
