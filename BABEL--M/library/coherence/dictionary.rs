use std::{collections::HashSet, sync::Arc};

use once_cell::sync::Lazy;

const STANDARD_WORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we",
    "say", "her", "she", "or", "an", "will", "my", "one", "all", "would", "there", "their",
    "what", "so", "up", "out", "if", "about", "who", "get", "which", "go", "me", "when", "make",
    "can", "like", "time", "no", "just", "him", "know", "take", "people", "into", "year",
    "your", "good", "some", "could", "them", "see", "other", "than", "then", "now", "look",
    "only", "come", "its", "over", "think", "also", "back", "after", "use", "two", "how", "our",
    "work", "first", "well", "way", "even", "new", "want", "because", "any", "these", "give",
    "day", "most", "us", "created", "system", "prime", "thalos", "tony", "ray", "macier",
    "discovery", "knowledge", "engine", "platform", "data", "process", "generate", "library",
    "babel", "page", "book", "text", "search", "find", "algorithm", "computer", "science",
    "mathematics", "research", "study", "analysis",
];

static STANDARD: Lazy<Arc<EnglishDictionary>> = Lazy::new(|| {
    Arc::new(EnglishDictionary::from_words(STANDARD_WORDS.iter().copied()))
});

/// Closed, case-insensitive reference word set.
///
/// Dictionaries are immutable once built. The standard set is constructed once per
/// process and shared; [`EnglishDictionary::extended`] derives a new set instead of
/// mutating a shared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnglishDictionary {
    words: HashSet<String>,
}

impl EnglishDictionary {
    /// Builds a dictionary from arbitrary words (stored lowercased).
    #[must_use]
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|word| word.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Shared handle to the standard word set.
    #[must_use]
    pub fn standard() -> Arc<Self> {
        Arc::clone(&STANDARD)
    }

    /// Returns a copy of this dictionary with extra words added.
    #[must_use]
    pub fn extended<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = self.words.clone();
        words.extend(extra.into_iter().map(|word| word.as_ref().to_lowercase()));
        Self { words }
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        if word.chars().any(char::is_uppercase) {
            self.words.contains(&word.to_lowercase())
        } else {
            self.words.contains(word)
        }
    }

    /// Number of words in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when the set holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
