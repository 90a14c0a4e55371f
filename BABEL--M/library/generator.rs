//! Deterministic page generation and candidate-address synthesis.
//!
//! Page content is a pure function of the address: the address is the seed of a
//! linear congruential recurrence, and each step emits one charset symbol. The
//! charset order, the three recurrence constants, and the iteration order are all
//! part of the output contract.

use indexmap::IndexSet;
use md5::{Digest, Md5};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::address::{format_seed, parse_seed};
use crate::error::LibraryResult;

/// Page alphabet: space, `a`-`z`, comma, period.
pub const CHARSET: &[u8; 29] = b" abcdefghijklmnopqrstuvwxyz,.";
/// Number of symbols in [`CHARSET`].
pub const CHARSET_SIZE: u64 = 29;
/// Characters per page.
pub const PAGE_LENGTH: usize = 3200;
/// Recurrence multiplier.
pub const MULTIPLIER: u64 = 1_103_515_245;
/// Recurrence increment.
pub const INCREMENT: u64 = 12_345;
/// Recurrence modulus (2^31).
pub const MODULUS: u64 = 1 << 31;

/// Prime used to spread character-sum seeds away from the recurrence multiplier.
const CHAR_SUM_PRIME: u64 = 997;
/// Maximum number of fragments that contribute seeds.
const FRAGMENT_SEED_LIMIT: usize = 10;
/// Seeds evaluated per parallel batch during substring scans.
const SCAN_CHUNK: usize = 256;

/// Half-open range of seeds a substring scan may visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedWindow {
    /// First seed (inclusive).
    pub start: u64,
    /// Last seed (exclusive).
    pub end: u64,
}

impl SeedWindow {
    /// Default window for hash-anchored substring scans.
    pub const SUBSTRING_DEFAULT: Self = Self::new(0, 1_000_000);
    /// Default window for residue-pruned inversion.
    pub const INVERSION_DEFAULT: Self = Self::new(0, 5_000);

    /// Creates a window.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Returns true when the window contains no seeds.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Number of seeds in the window.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Restricts the window to seeds the recurrence can actually hold.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self::new(self.start.min(MODULUS), self.end.min(MODULUS))
    }
}

/// Address whose page contains a searched substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringMatch {
    /// Canonical page address.
    pub address: String,
    /// Character offset of the first occurrence.
    pub position: usize,
}

/// Residue classes (seed mod 29) admitted by the reduced recurrence for a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueFilter {
    residues: Vec<u64>,
}

impl ResidueFilter {
    /// Residues that reproduce the pattern under the reduced recurrence.
    #[must_use]
    pub fn residues(&self) -> &[u64] {
        &self.residues
    }

    /// True when the filter excludes at least one residue.
    #[must_use]
    pub fn prunes(&self) -> bool {
        !self.residues.is_empty() && (self.residues.len() as u64) < CHARSET_SIZE
    }

    fn admits(&self, seed: u64) -> bool {
        self.residues.contains(&(seed % CHARSET_SIZE))
    }
}

/// Stateless page generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageGenerator;

impl PageGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates the page at a hex address.
    pub fn page_from_address(&self, address: &str) -> LibraryResult<String> {
        let seed = parse_seed(address)?;
        Ok(self.page_from_seed(seed))
    }

    /// Generates the page for an already-parsed seed.
    #[must_use]
    pub fn page_from_seed(&self, seed: u64) -> String {
        let mut state = seed % MODULUS;
        let mut page = String::with_capacity(PAGE_LENGTH);
        for _ in 0..PAGE_LENGTH {
            state = (state * MULTIPLIER + INCREMENT) % MODULUS;
            page.push(char::from(CHARSET[(state % CHARSET_SIZE) as usize]));
        }
        page
    }

    /// Canonical address for a seed.
    #[must_use]
    pub fn address_from_seed(&self, seed: u64) -> String {
        format_seed(seed)
    }

    /// Splits a phrase into single-word, bigram, and trigram fragments, in that order.
    ///
    /// Words and bigrams shorter than `min_length` characters are dropped; trigrams are
    /// only produced for phrases of three or more words and are never length-filtered.
    #[must_use]
    pub fn split_phrase_to_fragments(&self, phrase: &str, min_length: usize) -> Vec<String> {
        let lowered = phrase.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let mut fragments = Vec::new();

        for word in &words {
            if word.chars().count() >= min_length {
                fragments.push((*word).to_string());
            }
        }
        for pair in words.windows(2) {
            let bigram = pair.join(" ");
            if bigram.chars().count() >= min_length {
                fragments.push(bigram);
            }
        }
        if words.len() >= 3 {
            for triple in words.windows(3) {
                fragments.push(triple.join(" "));
            }
        }
        fragments
    }

    /// Fragments with the default minimum length of three.
    #[must_use]
    pub fn fragments(&self, phrase: &str) -> Vec<String> {
        self.split_phrase_to_fragments(phrase, 3)
    }

    /// Derives up to `num_candidates` distinct addresses from a phrase.
    ///
    /// Three seed sources contribute in order: the phrase digest, per-fragment
    /// digests, and multiples of the phrase's character-code sum.
    #[must_use]
    pub fn generate_candidate_addresses(&self, phrase: &str, num_candidates: usize) -> Vec<String> {
        let per_strategy = num_candidates / 3;
        let mut seeds: IndexSet<u64> = IndexSet::new();

        let phrase_seed = digest_seed(phrase);
        for i in 0..per_strategy as u64 {
            seeds.insert((phrase_seed + i) % MODULUS);
        }

        let fragments = self.fragments(phrase);
        if !fragments.is_empty() {
            let per_fragment = (num_candidates / (3 * fragments.len())).max(1) as u64;
            for fragment in fragments.iter().take(FRAGMENT_SEED_LIMIT) {
                let fragment_seed = digest_seed(fragment);
                for i in 0..per_fragment {
                    seeds.insert((fragment_seed + i) % MODULUS);
                }
            }
        }

        let char_sum = phrase.chars().map(u64::from).sum::<u64>() % MODULUS;
        for i in 0..per_strategy as u64 {
            let multiple = char_sum * ((i + 1) % MODULUS) % MODULUS;
            seeds.insert(multiple * CHAR_SUM_PRIME % MODULUS);
        }

        seeds
            .into_iter()
            .take(num_candidates)
            .map(format_seed)
            .collect()
    }

    /// Unpruned scan of seeds anchored at the substring's digest.
    ///
    /// Offsets in `window` are added to the digest seed; every page is generated and
    /// searched. Matches are returned in offset order.
    #[must_use]
    pub fn find_substring_candidates(
        &self,
        substring: &str,
        max_candidates: usize,
        window: SeedWindow,
    ) -> Vec<SubstringMatch> {
        if window.is_empty() {
            return Vec::new();
        }
        let base = digest_seed(substring);
        let seeds = (window.start..window.end).map(move |offset| (base + offset % MODULUS) % MODULUS);
        self.scan_seeds(seeds, substring, max_candidates)
    }

    /// Unpruned scan of the raw seeds in `window`.
    #[must_use]
    pub fn scan_seed_window(
        &self,
        substring: &str,
        max_candidates: usize,
        window: SeedWindow,
    ) -> Vec<SubstringMatch> {
        let window = window.clamped();
        if window.is_empty() {
            return Vec::new();
        }
        self.scan_seeds(window.start..window.end, substring, max_candidates)
    }

    /// Builds the residue filter for a pattern, or `None` if a symbol lies outside the charset.
    ///
    /// The filter simulates the recurrence modulo 29 only. It ignores carries from the
    /// true modulus, so it is an approximation used for pruning, not a proof.
    #[must_use]
    pub fn residue_filter(&self, substring: &str) -> Option<ResidueFilter> {
        let targets = substring
            .chars()
            .map(charset_index)
            .collect::<Option<Vec<u64>>>()?;
        let a_mod = MULTIPLIER % CHARSET_SIZE;
        let c_mod = INCREMENT % CHARSET_SIZE;

        let residues = (0..CHARSET_SIZE)
            .filter(|&residue| {
                let mut state = residue;
                targets.iter().all(|&target| {
                    let matched = state == target;
                    state = (a_mod * state + c_mod) % CHARSET_SIZE;
                    matched
                })
            })
            .collect();
        Some(ResidueFilter { residues })
    }

    /// Residue-pruned substring search over raw seeds.
    ///
    /// Seeds whose residue the filter rejects are skipped. When no residue passes, or
    /// the pruned scan finds nothing, every seed in the window is scanned instead.
    #[must_use]
    pub fn invert_substring(
        &self,
        substring: &str,
        max_candidates: usize,
        window: SeedWindow,
    ) -> Vec<SubstringMatch> {
        if substring.is_empty() {
            return Vec::new();
        }
        let substring = substring.to_lowercase();
        let Some(filter) = self.residue_filter(&substring) else {
            return Vec::new();
        };
        let window = window.clamped();
        if window.is_empty() {
            return Vec::new();
        }

        if filter.prunes() {
            let pruned = (window.start..window.end).filter(|&seed| filter.admits(seed));
            let found = self.scan_seeds(pruned, &substring, max_candidates);
            if !found.is_empty() {
                return found;
            }
        }
        self.scan_seeds(window.start..window.end, &substring, max_candidates)
    }

    /// Generates pages for `seeds` in parallel batches, keeping seed order and stopping at the cap.
    fn scan_seeds(
        &self,
        seeds: impl Iterator<Item = u64>,
        substring: &str,
        max_candidates: usize,
    ) -> Vec<SubstringMatch> {
        let mut found = Vec::new();
        if max_candidates == 0 {
            return found;
        }
        let mut seeds = seeds.peekable();
        while seeds.peek().is_some() && found.len() < max_candidates {
            let batch: Vec<u64> = seeds.by_ref().take(SCAN_CHUNK).collect();
            let hits: Vec<Option<SubstringMatch>> = batch
                .par_iter()
                .map(|&seed| {
                    self.page_from_seed(seed)
                        .find(substring)
                        .map(|position| SubstringMatch {
                            address: format_seed(seed),
                            position,
                        })
                })
                .collect();
            for hit in hits.into_iter().flatten() {
                if found.len() >= max_candidates {
                    break;
                }
                found.push(hit);
            }
        }
        found
    }
}

/// Index of a symbol in [`CHARSET`].
#[must_use]
pub fn charset_index(ch: char) -> Option<u64> {
    CHARSET
        .iter()
        .position(|&symbol| char::from(symbol) == ch)
        .map(|index| index as u64)
}

/// First 32 bits of the MD5 digest of `text`, read big-endian.
#[must_use]
pub fn digest_seed(text: &str) -> u64 {
    let digest = Md5::digest(text.as_bytes());
    u64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Generates the page at `address` with a default generator.
pub fn generate_page(address: &str) -> LibraryResult<String> {
    PageGenerator::new().page_from_address(address)
}
