//! Lexicon Loader
//!
//! Reference word list used by the corrector for membership tests and fuzzy
//! lookup. Loaded once, never mutated afterwards.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::error::LexiconError;

/// Immutable set of reference words, kept in file order
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    /// Entries in first-seen order (fuzzy ties resolve to the earliest)
    words: Vec<String>,
    /// Exact-match index
    index: HashSet<String>,
}

impl Lexicon {
    /// Lexicon with no entries; correction becomes a pass-through
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a lexicon from raw entries.
    ///
    /// Entries are trimmed; entries of one character or less, entries with
    /// inner whitespace and repeats are skipped.
    pub fn from_words<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = Vec::new();
        let mut index = HashSet::new();
        let mut skipped = 0usize;

        for entry in entries {
            let word = entry.as_ref().trim();
            if word.chars().count() <= 1 || word.chars().any(char::is_whitespace) {
                skipped += 1;
                continue;
            }
            if index.insert(word.to_string()) {
                words.push(word.to_string());
            }
        }

        if skipped > 0 {
            debug!("Skipped {} short or multi-word lexicon entries", skipped);
        }

        Self { words, index }
    }

    /// Load a UTF-8 word list, one word per line.
    ///
    /// A missing file yields an empty lexicon. A file that exists but cannot
    /// be read as UTF-8 is an error.
    pub fn load(path: &Path) -> Result<Self, LexiconError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No lexicon at {:?}, correction disabled", path);
                return Ok(Self::empty());
            }
            Err(source) => {
                return Err(LexiconError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        let lexicon = Self::from_words(content.lines());
        info!("Loaded {} lexicon entries from {:?}", lexicon.len(), path);
        Ok(lexicon)
    }

    /// Exact membership test
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    /// Entries in lexicon order
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
