use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::scorer::{split_sentences, CoherenceScorer, CoherenceScores};
use crate::address::compare_addresses;

/// Composite at or above which a decoded page is flagged coherent.
pub const COHERENT_THRESHOLD: f64 = 50.0;

/// Scored page produced by [`PageDecoder::decode_pages`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedPage {
    /// Page address.
    pub address: String,
    /// Page content.
    pub content: String,
    /// Sub-scores and composite.
    pub scores: CoherenceScores,
    /// Composite score.
    pub coherence: f64,
    /// Whether the composite reaches the decoder's coherent threshold.
    pub is_coherent: bool,
}

/// Sentence-level span that scored well on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Trimmed passage text.
    pub text: String,
    /// Index of the segment in the split page.
    pub index: usize,
    /// Length in characters.
    pub length: usize,
    /// Composite score of the passage alone.
    pub coherence: f64,
}

/// Batch scorer and passage extractor.
#[derive(Debug, Clone)]
pub struct PageDecoder {
    scorer: CoherenceScorer,
    min_score: f64,
    coherent_threshold: f64,
}

impl Default for PageDecoder {
    fn default() -> Self {
        Self::new(CoherenceScorer::default(), 30.0)
    }
}

impl PageDecoder {
    /// Creates a decoder keeping pages whose composite reaches `min_score`.
    #[must_use]
    pub fn new(scorer: CoherenceScorer, min_score: f64) -> Self {
        Self {
            scorer,
            min_score,
            coherent_threshold: COHERENT_THRESHOLD,
        }
    }

    /// Replaces the composite at which decoded pages are flagged coherent.
    #[must_use]
    pub fn with_coherent_threshold(mut self, threshold: f64) -> Self {
        self.coherent_threshold = threshold;
        self
    }

    /// Composite at which decoded pages are flagged coherent.
    #[must_use]
    pub const fn coherent_threshold(&self) -> f64 {
        self.coherent_threshold
    }

    /// Scorer used for pages and passages.
    #[must_use]
    pub const fn scorer(&self) -> &CoherenceScorer {
        &self.scorer
    }

    /// Minimum composite a decoded page must reach.
    #[must_use]
    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Scores `(address, content)` pairs, drops those below the minimum, best first.
    #[must_use]
    pub fn decode_pages(
        &self,
        pages: &[(String, String)],
        target_phrases: &[String],
    ) -> Vec<DecodedPage> {
        let mut decoded: Vec<DecodedPage> = pages
            .par_iter()
            .filter_map(|(address, content)| {
                let scores = self.scorer.score_page(content, target_phrases);
                (scores.composite >= self.min_score).then(|| DecodedPage {
                    address: address.clone(),
                    content: content.clone(),
                    coherence: scores.composite,
                    is_coherent: scores.composite >= self.coherent_threshold,
                    scores,
                })
            })
            .collect();
        decoded.sort_by(|a, b| {
            b.coherence
                .total_cmp(&a.coherence)
                .then_with(|| compare_addresses(&a.address, &b.address))
        });
        decoded
    }

    /// Extracts sentence segments that are long and coherent enough on their own.
    #[must_use]
    pub fn extract_coherent_passages(
        &self,
        content: &str,
        min_passage_length: usize,
        min_coherence: f64,
    ) -> Vec<Passage> {
        split_sentences(content)
            .enumerate()
            .filter_map(|(index, segment)| {
                let text = segment.trim();
                let length = text.chars().count();
                if length < min_passage_length {
                    return None;
                }
                let coherence = self.scorer.score_page(text, &[]).composite;
                (coherence >= min_coherence).then(|| Passage {
                    text: text.to_string(),
                    index,
                    length,
                    coherence,
                })
            })
            .collect()
    }
}
