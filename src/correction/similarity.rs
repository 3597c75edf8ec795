//! String similarity scorers
//!
//! Scores are percentages in [0, 100]. Both scorers work on Unicode scalar
//! values, so a Bengali vowel sign counts as one character of its own.

use super::{FuzzyMatch, FuzzyMatcher};
use crate::config::ScorerKind;

/// Indel similarity: `200 * LCS / (len(a) + len(b))`.
///
/// This is the share of characters that line up when only insertions and
/// deletions are allowed. Two empty strings score 100.
pub fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Normalized Levenshtein similarity scaled to [0, 100]
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Length of the longest common subsequence (two-row DP)
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Best score any string of length `b` could reach against one of length `a`
fn upper_bound(kind: ScorerKind, a: usize, b: usize) -> f64 {
    let (short, long) = (a.min(b), a.max(b));
    if long == 0 {
        return 100.0;
    }
    match kind {
        ScorerKind::Indel => 200.0 * short as f64 / (a + b) as f64,
        ScorerKind::Levenshtein => 100.0 * short as f64 / long as f64,
    }
}

/// Linear-scan matcher over a candidate list
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanMatcher {
    kind: ScorerKind,
}

impl ScanMatcher {
    pub fn new(kind: ScorerKind) -> Self {
        Self { kind }
    }

    fn score(&self, query: &str, query_chars: &[char], candidate: &str) -> f64 {
        match self.kind {
            ScorerKind::Indel => {
                let candidate_chars: Vec<char> = candidate.chars().collect();
                indel_ratio(query_chars, &candidate_chars)
            }
            ScorerKind::Levenshtein => levenshtein_ratio(query, candidate),
        }
    }
}

impl FuzzyMatcher for ScanMatcher {
    fn best_match<'c>(
        &self,
        query: &str,
        candidates: &'c [String],
        score_cutoff: f64,
    ) -> Option<FuzzyMatch<'c>> {
        let query_chars: Vec<char> = query.chars().collect();
        let mut best: Option<FuzzyMatch<'c>> = None;

        for candidate in candidates {
            let bound = upper_bound(self.kind, query_chars.len(), candidate.chars().count());
            let unreachable = match &best {
                Some(b) => bound <= b.score,
                None => bound < score_cutoff,
            };
            if unreachable {
                continue;
            }

            let score = self.score(query, &query_chars, candidate);
            // Strictly greater: the earliest candidate wins ties
            let improves = match &best {
                Some(b) => score > b.score,
                None => score >= score_cutoff,
            };
            if improves {
                best = Some(FuzzyMatch {
                    candidate: candidate.as_str(),
                    score,
                });
                if score >= 100.0 {
                    break;
                }
            }
        }

        best
    }
}
