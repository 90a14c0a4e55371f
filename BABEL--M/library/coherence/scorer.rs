use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::dictionary::EnglishDictionary;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("sentence break pattern"));

const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];

/// Weight of each sub-score in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceWeights {
    /// Dictionary-word density.
    pub english_density: f64,
    /// Punctuation ratio band.
    pub punctuation: f64,
    /// Sentence shape.
    pub sentence_structure: f64,
    /// Vocabulary spread.
    pub word_distribution: f64,
    /// Target phrase coverage.
    pub phrase_match: f64,
    /// Character entropy band.
    pub entropy: f64,
}

impl CoherenceWeights {
    /// Fixed weights of the composite score.
    pub const STANDARD: Self = Self {
        english_density: 0.35,
        punctuation: 0.15,
        sentence_structure: 0.20,
        word_distribution: 0.10,
        phrase_match: 0.15,
        entropy: 0.05,
    };
}

impl Default for CoherenceWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Named sub-scores (each in `[0, 1]`) and the composite (in `[0, 100]`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoherenceScores {
    /// Fraction of tokens found in the dictionary.
    pub english_density: f64,
    /// Punctuation ratio band score.
    pub punctuation: f64,
    /// Sentence boundary, length, and capitalization score.
    pub sentence_structure: f64,
    /// Vocabulary diversity score.
    pub word_distribution: f64,
    /// Fraction of target phrases present.
    pub phrase_match: f64,
    /// Character entropy band score.
    pub entropy: f64,
    /// Weighted composite scaled to `[0, 100]`.
    pub composite: f64,
}

impl CoherenceScores {
    /// Sub-scores keyed by name, composite last.
    #[must_use]
    pub fn as_map(&self) -> IndexMap<&'static str, f64> {
        IndexMap::from([
            ("english_density", self.english_density),
            ("punctuation", self.punctuation),
            ("sentence_structure", self.sentence_structure),
            ("word_distribution", self.word_distribution),
            ("phrase_match", self.phrase_match),
            ("entropy", self.entropy),
            ("composite", self.composite),
        ])
    }
}

/// Heuristic readability scorer.
#[derive(Debug, Clone)]
pub struct CoherenceScorer {
    dictionary: Arc<EnglishDictionary>,
    weights: CoherenceWeights,
}

impl Default for CoherenceScorer {
    fn default() -> Self {
        Self::new(EnglishDictionary::standard())
    }
}

impl CoherenceScorer {
    /// Creates a scorer over a shared dictionary.
    #[must_use]
    pub fn new(dictionary: Arc<EnglishDictionary>) -> Self {
        Self {
            dictionary,
            weights: CoherenceWeights::STANDARD,
        }
    }

    /// Dictionary used for density scoring.
    #[must_use]
    pub fn dictionary(&self) -> &EnglishDictionary {
        &self.dictionary
    }

    /// Scores `content`, optionally against phrases it is expected to contain.
    #[must_use]
    pub fn score_page(&self, content: &str, target_phrases: &[String]) -> CoherenceScores {
        let cleaned = normalize(content);
        let tokens: Vec<&str> = cleaned.split(' ').filter(|t| !t.is_empty()).collect();

        let mut scores = CoherenceScores {
            english_density: self.english_density(&tokens),
            punctuation: punctuation_score(content),
            sentence_structure: sentence_structure_score(content),
            word_distribution: word_distribution_score(&tokens),
            phrase_match: phrase_match_score(content, target_phrases),
            entropy: entropy_score(content),
            composite: 0.0,
        };
        scores.composite = self.composite(&scores);
        scores
    }

    /// True when the composite of `content` reaches `min_score`.
    #[must_use]
    pub fn is_coherent(&self, content: &str, min_score: f64) -> bool {
        self.score_page(content, &[]).composite >= min_score
    }

    fn english_density(&self, tokens: &[&str]) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let known = tokens
            .iter()
            .filter(|token| self.dictionary.is_word(token))
            .count();
        known as f64 / tokens.len() as f64
    }

    fn composite(&self, scores: &CoherenceScores) -> f64 {
        let w = &self.weights;
        let weighted = scores.english_density * w.english_density
            + scores.punctuation * w.punctuation
            + scores.sentence_structure * w.sentence_structure
            + scores.word_distribution * w.word_distribution
            + scores.phrase_match * w.phrase_match
            + scores.entropy * w.entropy;
        (weighted * 100.0).clamp(0.0, 100.0)
    }
}

/// Lowercases and collapses whitespace runs to single spaces.
#[must_use]
pub fn normalize(text: &str) -> String {
    WHITESPACE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Splits on runs of sentence terminators, keeping empty trailing segments.
pub fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE_BREAK.split(text)
}

fn punctuation_score(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let punct = text.chars().filter(char::is_ascii_punctuation).count();
    let ratio = punct as f64 / total as f64;
    if (0.02..=0.08).contains(&ratio) {
        1.0
    } else if (0.01..=0.12).contains(&ratio) {
        0.7
    } else if ratio < 0.01 {
        0.3
    } else {
        0.2
    }
}

fn sentence_structure_score(text: &str) -> f64 {
    let mut score = 0.0;
    let endings = text.chars().filter(|c| SENTENCE_ENDINGS.contains(c)).count();
    if endings > 0 {
        score += 0.3;
        let mean_length = text.chars().count() as f64 / endings as f64;
        if (50.0..=200.0).contains(&mean_length) {
            score += 0.4;
        } else if (30.0..=300.0).contains(&mean_length) {
            score += 0.2;
        }
    }

    let segments: Vec<&str> = split_sentences(text).collect();
    if segments.len() > 1 {
        let capitalized = segments
            .iter()
            .filter(|segment| {
                segment
                    .trim()
                    .chars()
                    .next()
                    .is_some_and(char::is_uppercase)
            })
            .count();
        score += 0.3 * capitalized as f64 / segments.len() as f64;
    }
    score.min(1.0)
}

fn word_distribution_score(tokens: &[&str]) -> f64 {
    if tokens.len() < 10 {
        return 0.5;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_default() += 1;
    }
    let total = tokens.len() as f64;
    let unique_ratio = counts.len() as f64 / total;
    let most_common = counts.values().copied().max().unwrap_or(1);

    let mut diversity = if (0.3..=0.7).contains(&unique_ratio) {
        1.0
    } else if (0.2..=0.8).contains(&unique_ratio) {
        0.7
    } else {
        0.4
    };
    if most_common as f64 / total > 0.2 {
        diversity *= 0.5;
    }
    diversity
}

fn phrase_match_score(text: &str, target_phrases: &[String]) -> f64 {
    if target_phrases.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let matches = target_phrases
        .iter()
        .filter(|phrase| lowered.contains(&phrase.to_lowercase()))
        .count();
    matches as f64 / target_phrases.len() as f64
}

fn entropy_score(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for ch in text.chars().flat_map(char::to_lowercase) {
        *counts.entry(ch).or_default() += 1;
    }
    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum();
    let normalized = entropy / 29f64.log2();
    if (0.7..=0.95).contains(&normalized) {
        1.0
    } else if (0.5..1.0).contains(&normalized) {
        0.6
    } else {
        0.3
    }
}

/// Scores `content` with the standard dictionary.
#[must_use]
pub fn score_page(content: &str, target_phrases: &[String]) -> CoherenceScores {
    CoherenceScorer::default().score_page(content, target_phrases)
}

/// Checks `content` against a composite threshold with the standard dictionary.
#[must_use]
pub fn is_coherent(content: &str, min_score: f64) -> bool {
    CoherenceScorer::default().is_coherent(content, min_score)
}
