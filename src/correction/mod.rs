//! Lexical Corrector
//!
//! Replaces each whitespace-delimited token with its closest lexicon entry
//! when the similarity reaches the acceptance threshold. Line structure and
//! token count per line are preserved.
//!
//! Punctuation attached to a token stays part of the token, so `"ঢাকা,"` is
//! matched as written. This keeps numbers and punctuation intact at the cost
//! of missing some corrections.

pub mod similarity;

use std::sync::Arc;
use tracing::debug;

use crate::config::CorrectionSettings;
use crate::lexicon::Lexicon;

pub use similarity::ScanMatcher;

/// Best-scoring candidate for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch<'c> {
    /// Matched candidate
    pub candidate: &'c str,
    /// Similarity in [0, 100]
    pub score: f64,
}

/// Best-fuzzy-match capability
pub trait FuzzyMatcher: Send + Sync {
    /// Best candidate scoring at least `score_cutoff`.
    ///
    /// Among equal scores the candidate that comes first wins.
    fn best_match<'c>(
        &self,
        query: &str,
        candidates: &'c [String],
        score_cutoff: f64,
    ) -> Option<FuzzyMatch<'c>>;
}

/// Token-level spell corrector backed by a lexicon
pub struct Corrector {
    lexicon: Arc<Lexicon>,
    matcher: Box<dyn FuzzyMatcher>,
    threshold: f64,
}

impl Corrector {
    /// Create a corrector using the configured scorer and threshold
    pub fn new(lexicon: Arc<Lexicon>, settings: &CorrectionSettings) -> Self {
        Self::with_matcher(
            lexicon,
            Box::new(ScanMatcher::new(settings.scorer)),
            settings.threshold,
        )
    }

    /// Create a corrector with a custom matcher
    pub fn with_matcher(lexicon: Arc<Lexicon>, matcher: Box<dyn FuzzyMatcher>, threshold: f64) -> Self {
        Self {
            lexicon,
            matcher,
            threshold,
        }
    }

    /// Acceptance threshold (inclusive)
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Correct a single token
    pub fn correct_word<'a>(&'a self, word: &'a str) -> &'a str {
        if self.lexicon.is_empty() || self.lexicon.contains(word) {
            return word;
        }

        match self.matcher.best_match(word, self.lexicon.words(), self.threshold) {
            Some(found) if found.score >= self.threshold => found.candidate,
            _ => word,
        }
    }

    /// Correct every token of every line.
    ///
    /// Lines are split on `\n` and tokens on whitespace, then re-joined with
    /// single spaces. With an empty lexicon the text is returned untouched.
    pub fn correct_text(&self, text: &str) -> String {
        if self.lexicon.is_empty() {
            return text.to_string();
        }

        let mut replaced = 0usize;
        let lines: Vec<String> = text
            .split('\n')
            .map(|line| {
                line.split_whitespace()
                    .map(|token| {
                        let corrected = self.correct_word(token);
                        if corrected != token {
                            debug!("Corrected {:?} -> {:?}", token, corrected);
                            replaced += 1;
                        }
                        corrected
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        debug!("Lexical correction replaced {} tokens", replaced);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScorerKind;

    fn corrector(words: &[&str]) -> Corrector {
        Corrector::new(
            Arc::new(Lexicon::from_words(words.iter().copied())),
            &CorrectionSettings::default(),
        )
    }

    /// Matcher that reports a fixed score for the first candidate
    struct FixedScore(f64);

    impl FuzzyMatcher for FixedScore {
        fn best_match<'c>(&self, _query: &str, candidates: &'c [String], _cutoff: f64) -> Option<FuzzyMatch<'c>> {
            candidates.first().map(|c| FuzzyMatch {
                candidate: c.as_str(),
                score: self.0,
            })
        }
    }

    fn fixed(score: f64) -> Corrector {
        Corrector::with_matcher(
            Arc::new(Lexicon::from_words(["target"])),
            Box::new(FixedScore(score)),
            80.0,
        )
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(fixed(80.0).correct_word("tarxet"), "target");
        assert_eq!(fixed(79.0).correct_word("tarxet"), "tarxet");
        assert_eq!(fixed(79.999).correct_word("tarxet"), "tarxet");
    }

    #[test]
    fn test_exact_score_of_eighty_is_corrected() {
        // LCS 4 of 5 + 5 characters = 80
        let c = corrector(&["abcde"]);
        assert_eq!(c.correct_word("abcdx"), "abcde");
    }

    #[test]
    fn test_low_similarity_left_unchanged() {
        let c = corrector(&["abxy"]);
        assert_eq!(c.correct_word("abcd"), "abcd");
    }

    #[test]
    fn test_exact_match_returned_as_is() {
        let c = corrector(&["বাংলা", "বাংলাদেশ"]);
        assert_eq!(c.correct_word("বাংলা"), "বাংলা");
    }

    #[test]
    fn test_bengali_substitution_corrected() {
        let c = corrector(&["আমার", "সোনার", "বাংলাদেশ"]);
        let raw = "আমার সোনার বাংলাদেষ";
        assert_eq!(c.correct_text(raw), "আমার সোনার বাংলাদেশ");
    }

    #[test]
    fn test_empty_lexicon_passes_text_through() {
        let c = corrector(&[]);
        let raw = "Invoice  No. 4471\n\nTotal:   1,250.00 BDT\n";
        assert_eq!(c.correct_text(raw), raw);
    }

    #[test]
    fn test_line_structure_and_token_counts_preserved() {
        let c = corrector(&["আমার", "সোনার", "বাংলা", "ভালোবাসি"]);
        let raw = "আমার সোনার বাংলা\n\nআমি তোমায় ভালোবাসী 1971";
        let corrected = c.correct_text(raw);

        let raw_lines: Vec<&str> = raw.split('\n').collect();
        let out_lines: Vec<&str> = corrected.split('\n').collect();
        assert_eq!(raw_lines.len(), out_lines.len());
        for (r, o) in raw_lines.iter().zip(&out_lines) {
            assert_eq!(r.split_whitespace().count(), o.split_whitespace().count());
        }
        assert!(corrected.contains("ভালোবাসি"));
        assert!(corrected.contains("1971"));
    }

    #[test]
    fn test_correction_is_idempotent() {
        let c = corrector(&["আমার", "সোনার", "বাংলাদেশ", "hello"]);
        let once = c.correct_text("আমাব সোনার বাংলাদেষ\n\nhellp 42");
        let twice = c.correct_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_punctuation_is_part_of_token() {
        let c = corrector(&["ঢাকা"]);
        // "ঢাকা," scores 200*4/9 = 88.9 and is replaced, dropping the comma
        assert_eq!(c.correct_word("ঢাকা,"), "ঢাকা");
        // Heavier punctuation drags the score below the threshold
        assert_eq!(c.correct_word("(ঢাকা)।"), "(ঢাকা)।");
    }

    #[test]
    fn test_levenshtein_scorer_selectable() {
        let settings = CorrectionSettings {
            threshold: 80.0,
            scorer: ScorerKind::Levenshtein,
        };
        let c = Corrector::new(Arc::new(Lexicon::from_words(["hello"])), &settings);
        assert_eq!(c.correct_word("hallo"), "hello");
        assert_eq!(c.threshold(), 80.0);
    }
}
