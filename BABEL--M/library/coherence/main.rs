//! Coherence scoring pipeline.

/// Batch decoding and passage extraction.
pub mod decoder;
/// Closed reference word set.
pub mod dictionary;
/// Composite readability scorer.
pub mod scorer;

pub use decoder::{DecodedPage, PageDecoder, Passage, COHERENT_THRESHOLD};
pub use dictionary::EnglishDictionary;
pub use scorer::{
    is_coherent, normalize, score_page, CoherenceScorer, CoherenceScores, CoherenceWeights,
};
