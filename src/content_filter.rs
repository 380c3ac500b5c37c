//! Content filter (C2).
//!
//! Tokenizes coin names/descriptions and matches tokens against a
//! process-wide banned-word set. The set is read-mostly: the store
//! loader replaces it wholesale on reload, and readers take a cheap
//! atomic snapshot rather than locking (spec §5 reader-writer discipline).

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Punctuation stripped from token boundaries before matching.
const TRIM_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', '(', ')', '[', ']', '{', '}', '<', '>'];

/// Additional characters treated as token separators alongside whitespace.
const SPLIT_PUNCTUATION: &[char] = &[',', '.', ';', ':', '-', '_', '/', '(', ')', '[', ']', '{', '}', '"', '\'', '\n'];

fn tokenize(input: &str) -> Vec<String> {
    input
        .split(|c: char| c.is_ascii_whitespace() || SPLIT_PUNCTUATION.contains(&c))
        .map(|tok| tok.trim_matches(|c| TRIM_PUNCTUATION.contains(&c)))
        .filter(|tok| !tok.is_empty())
        .map(|tok| tok.to_lowercase())
        .collect()
}

/// Process-wide, reloadable banned-word set (spec §3).
///
/// Cloning a `BannedWords` is cheap: it shares the underlying `ArcSwap`,
/// so every clone observes reloads performed through any handle.
#[derive(Clone)]
pub struct BannedWords {
    inner: Arc<ArcSwap<HashSet<String>>>,
}

impl Default for BannedWords {
    fn default() -> Self {
        BannedWords {
            inner: Arc::new(ArcSwap::from_pointee(HashSet::new())),
        }
    }
}

impl BannedWords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from a known word list (tests, or a caller that
    /// already paged the `naughty_words` table itself).
    pub fn from_words<I: IntoIterator<Item = String>>(words: I) -> Self {
        let set: HashSet<String> = words.into_iter().map(|w| w.to_lowercase()).collect();
        BannedWords {
            inner: Arc::new(ArcSwap::from_pointee(set)),
        }
    }

    /// Atomically replace the set with a freshly loaded one (C2 loader).
    pub fn reload(&self, words: Vec<String>) {
        let set: HashSet<String> = words.into_iter().map(|w| w.to_lowercase()).collect();
        info!(word_count = set.len(), "banned-word set reloaded");
        self.inner.store(Arc::new(set));
    }

    fn contains(&self, token: &str) -> bool {
        self.inner.load().contains(token)
    }

    /// Returns true if `name` or `description` contain any banned word.
    /// Empty inputs never hit (C2).
    pub fn coin_contains_naughty_word(&self, name: &str, description: &str) -> bool {
        if name.is_empty() && description.is_empty() {
            return false;
        }
        tokenize(name).iter().any(|t| self.contains(t))
            || tokenize(description).iter().any(|t| self.contains(t))
    }

    pub fn word_count(&self) -> usize {
        self.inner.load().len()
    }
}
