//! Approximate string matching
//!
//! Scores a pattern against a text by the fewest edits needed to make the
//! pattern appear anywhere in the text, plus a penalty for how far from the
//! start of the text the match begins. Scores run from 0.0 (exact match at the
//! start) to 1.0 (nothing in common); a match is accepted at or below the
//! threshold.
//!
//! Patterns longer than [`MAX_PATTERN_LENGTH`] are split into chunks. The
//! text matches when any chunk does, and the score is the mean over all
//! chunks with a missed chunk counting as 1.0.

use crate::config::SearchSettings;
use crate::error::SearchError;

/// Longest pattern matched in one pass; longer patterns are chunked
pub const MAX_PATTERN_LENGTH: usize = 256;

/// Most chunks a pattern may be split into
pub const MAX_PATTERN_CHUNKS: usize = 16;

/// Matching parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyOptions {
    /// Highest accepted score
    pub threshold: f64,
    /// Patterns shorter than this never match
    pub min_match_char_length: usize,
    /// Characters from the start at which the location penalty reaches 1.0
    pub distance: usize,
    /// Score on edits alone
    pub ignore_location: bool,
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            min_match_char_length: 2,
            distance: 100,
            ignore_location: false,
        }
    }
}

impl FuzzyOptions {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            threshold: settings.threshold,
            min_match_char_length: settings.min_match_char_length,
            distance: settings.distance,
            ignore_location: settings.ignore_location,
        }
    }
}

/// A lowercased pattern ready to be matched against many texts
#[derive(Debug, Clone)]
pub struct Pattern {
    chunks: Vec<Vec<char>>,
    len: usize,
    options: FuzzyOptions,
}

impl Pattern {
    pub fn new(pattern: &str, options: FuzzyOptions) -> Result<Self, SearchError> {
        let chars: Vec<char> = pattern.to_lowercase().chars().collect();
        let len = chars.len();
        let chunks = split_chunks(chars);
        if chunks.len() > MAX_PATTERN_CHUNKS {
            return Err(SearchError::Execution(format!(
                "pattern length {} exceeds maximum of {}",
                len,
                MAX_PATTERN_LENGTH * MAX_PATTERN_CHUNKS
            )));
        }
        Ok(Self {
            chunks,
            len,
            options,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Score `text`, or `None` when it does not match
    pub fn score(&self, text: &str) -> Option<f64> {
        if self.len == 0 || self.len < self.options.min_match_char_length {
            return None;
        }

        let text: Vec<char> = text.to_lowercase().chars().collect();
        if text.is_empty() {
            return None;
        }

        if let [chunk] = self.chunks.as_slice() {
            return self.score_chunk(chunk, &text);
        }

        let mut matched = false;
        let mut total = 0.0;
        for chunk in &self.chunks {
            match self.score_chunk(chunk, &text) {
                Some(score) => {
                    matched = true;
                    total += score;
                }
                None => total += 1.0,
            }
        }
        matched.then(|| total / self.chunks.len() as f64)
    }

    fn score_chunk(&self, pattern: &[char], text: &[char]) -> Option<f64> {
        let m = pattern.len();

        // Column j of the table: for each pattern prefix, (edits, start) of the
        // cheapest alignment ending at text[j]. Starting anywhere is free.
        let mut prev: Vec<(usize, usize)> = (0..=m).map(|i| (i, 0)).collect();
        let mut best = self.candidate(m, prev[m]);

        for (j, &tc) in text.iter().enumerate() {
            let mut cur = Vec::with_capacity(m + 1);
            cur.push((0, j + 1));
            for i in 1..=m {
                let (diag_cost, diag_start) = prev[i - 1];
                let substitution = (diag_cost + usize::from(pattern[i - 1] != tc), diag_start);
                let (up_cost, up_start) = cur[i - 1];
                let skip_pattern = (up_cost + 1, up_start);
                let (left_cost, left_start) = prev[i];
                let skip_text = (left_cost + 1, left_start);
                cur.push(substitution.min(skip_pattern).min(skip_text));
            }
            best = best.min_by_score(self.candidate(m, cur[m]));
            prev = cur;
        }

        (best.0 <= self.options.threshold).then_some(best.0)
    }

    fn candidate(&self, len: usize, (edits, start): (usize, usize)) -> Candidate {
        let accuracy = edits as f64 / len as f64;
        if self.options.ignore_location {
            return Candidate(accuracy);
        }
        let proximity = start as f64;
        if self.options.distance == 0 {
            return Candidate(if proximity > 0.0 { 1.0 } else { accuracy });
        }
        Candidate((accuracy + proximity / self.options.distance as f64).min(1.0))
    }
}

/// Full-width chunks; a remainder becomes the last full-width window
fn split_chunks(chars: Vec<char>) -> Vec<Vec<char>> {
    if chars.len() <= MAX_PATTERN_LENGTH {
        return vec![chars];
    }
    let mut chunks: Vec<Vec<char>> = chars
        .chunks_exact(MAX_PATTERN_LENGTH)
        .map(<[char]>::to_vec)
        .collect();
    if chars.len() % MAX_PATTERN_LENGTH != 0 {
        chunks.push(chars[chars.len() - MAX_PATTERN_LENGTH..].to_vec());
    }
    chunks
}

#[derive(Debug, Clone, Copy)]
struct Candidate(f64);

impl Candidate {
    fn min_by_score(self, other: Candidate) -> Candidate {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

/// Score a single pattern/text pair
pub fn score(pattern: &str, text: &str, options: &FuzzyOptions) -> Result<Option<f64>, SearchError> {
    Ok(Pattern::new(pattern, options.clone())?.score(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> FuzzyOptions {
        FuzzyOptions::default()
    }

    #[test]
    fn test_exact_match_scores_zero() {
        assert_eq!(score("hello", "Hello World", &opts()).unwrap(), Some(0.0));
    }

    #[test]
    fn test_one_edit_matches() {
        let s = score("Helo", "Hello World", &opts()).unwrap().unwrap();
        assert!((s - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_does_not_match() {
        assert_eq!(score("zzz", "Goodbye", &opts()).unwrap(), None);
        assert_eq!(score("zzz", "Hello World", &opts()).unwrap(), None);
    }

    #[test]
    fn test_short_pattern_rejected() {
        assert_eq!(score("h", "hello", &opts()).unwrap(), None);
        assert_eq!(score("", "hello", &opts()).unwrap(), None);
    }

    #[test]
    fn test_location_penalty() {
        let text = format!("{}needle", "x".repeat(50));
        // Exact match, but 50 characters in: 0.5 > 0.4
        assert_eq!(score("needle", &text, &opts()).unwrap(), None);

        let loose = FuzzyOptions {
            ignore_location: true,
            ..opts()
        };
        assert_eq!(score("needle", &text, &loose).unwrap(), Some(0.0));
    }

    #[test]
    fn test_near_start_still_matches() {
        let s = score("world", "Hello World", &opts()).unwrap().unwrap();
        assert!((s - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_unicode_case_folding() {
        assert_eq!(score("thể thao", "Thể Thao Việt Nam", &opts()).unwrap(), Some(0.0));
    }

    #[test]
    fn test_long_pattern_is_chunked() {
        let chunk = "b".repeat(MAX_PATTERN_LENGTH);
        let long = format!("{}{}", chunk, "c".repeat(200));
        let pattern = Pattern::new(&long, opts()).unwrap();
        assert_eq!(pattern.len(), MAX_PATTERN_LENGTH + 200);

        // First chunk matches exactly, the tail window does not
        let s = pattern.score(&chunk).unwrap();
        assert!((s - 0.5).abs() < 1e-9);
        assert_eq!(pattern.score("zzzz"), None);
    }

    #[test]
    fn test_pattern_too_long() {
        let long = "a".repeat(MAX_PATTERN_LENGTH * MAX_PATTERN_CHUNKS + 1);
        assert!(matches!(
            score(&long, "aaa", &opts()),
            Err(SearchError::Execution(_))
        ));
    }
}
