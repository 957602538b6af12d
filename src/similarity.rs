// src/similarity.rs
//! Fuzzy similarity between titles, excerpts and whole articles.
//!
//! Similarity: `strsim::normalized_levenshtein` over lowercased text, in [0.0, 1.0].
//! Inputs are cut to a bounded number of characters so pairwise passes over a
//! daily pool stay cheap.

use strsim::normalized_levenshtein;

use crate::article::Article;
use crate::normalize::normalize_title;

/// Default cap on characters compared per side.
pub const DEFAULT_MAX_COMPARE_CHARS: usize = 500;

pub const TITLE_WEIGHT: f64 = 0.6;
pub const CONTENT_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy)]
pub struct SimilarityScorer {
    max_chars: usize,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPARE_CHARS)
    }
}

impl SimilarityScorer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// Symmetric ratio; `1.0` iff equal after case-folding, `0.0` if either side is empty.
    pub fn text_similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        if a == b {
            return 1.0;
        }
        let a = window(&a, self.max_chars);
        let b = window(&b, self.max_chars);
        // Differences past the compare window still mean "not identical".
        normalized_levenshtein(a, b).min(1.0 - f64::EPSILON)
    }

    /// `0.6 * title + 0.4 * content`. Titles carry more weight because excerpts
    /// are truncated differently per source.
    pub fn article_similarity(&self, x: &Article, y: &Article) -> f64 {
        let title = self.text_similarity(&normalize_title(&x.title), &normalize_title(&y.title));
        let content = self.text_similarity(&x.content_excerpt, &y.content_excerpt);
        TITLE_WEIGHT * title + CONTENT_WEIGHT * content
    }
}

fn window(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Module-level shorthand using the default scorer.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    SimilarityScorer::default().text_similarity(a, b)
}

/// Module-level shorthand using the default scorer.
pub fn article_similarity(x: &Article, y: &Article) -> f64 {
    SimilarityScorer::default().article_similarity(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::SourceType;

    #[test]
    fn identical_after_case_folding_is_one() {
        assert_eq!(text_similarity("AI Breakthrough", "ai breakthrough"), 1.0);
    }

    #[test]
    fn empty_side_is_zero() {
        assert_eq!(text_similarity("", "x"), 0.0);
        assert_eq!(text_similarity("x", ""), 0.0);
        assert_eq!(text_similarity("", ""), 0.0);
    }

    #[test]
    fn symmetric() {
        let a = "Fed holds rates steady";
        let b = "Fed keeps rates steady";
        assert_eq!(text_similarity(a, b), text_similarity(b, a));
        let s = text_similarity(a, b);
        assert!(s > 0.5 && s < 1.0);
    }

    #[test]
    fn article_similarity_weights_title_over_content() {
        let x = Article::new("Same headline", SourceType::Feed).with_content("alpha beta gamma");
        let y = Article::new("Same headline | Wire", SourceType::Social).with_content("zzz");
        let s = article_similarity(&x, &y);
        assert!(s >= TITLE_WEIGHT && s < 1.0, "got {s}");
    }

    #[test]
    fn compare_window_is_bounded() {
        let scorer = SimilarityScorer::new(10);
        let a = format!("{}{}", "a".repeat(10), "x".repeat(50));
        let b = format!("{}{}", "a".repeat(10), "y".repeat(50));
        let s = scorer.text_similarity(&a, &b);
        assert!(s > 0.99 && s < 1.0, "got {s}");
    }
}
