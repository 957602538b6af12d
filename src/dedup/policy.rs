// src/dedup/policy.rs
//! Which of two duplicates survives, how good a group member is, and what a winner
//! inherits from the members it beat.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

use crate::article::{Article, SourceType};
use crate::config::{DedupConfig, QualityConfig};

const RELEVANCE_WEIGHT: f64 = 0.4;
const TRUSTED_SOURCE_BONUS: f64 = 15.0;

/// Ordered tie-breakers; the first decisive one wins, otherwise the incumbent stays.
///
/// 1. higher relevance
/// 2. longer excerpt, by more than `min_content_gain` characters
/// 3. source-type priority (feed > newsletter > social)
/// 4. more recent `published_at` (both must be known)
pub fn should_replace(incumbent: &Article, challenger: &Article, min_content_gain: usize) -> bool {
    match challenger.relevance().partial_cmp(&incumbent.relevance()) {
        Some(Ordering::Greater) => return true,
        Some(Ordering::Less) => return false,
        _ => {}
    }

    let (inc_len, ch_len) = (incumbent.content_len(), challenger.content_len());
    if ch_len.abs_diff(inc_len) > min_content_gain {
        return ch_len > inc_len;
    }

    let (inc_p, ch_p) = (
        incumbent.source_type.priority(),
        challenger.source_type.priority(),
    );
    if inc_p != ch_p {
        return ch_p > inc_p;
    }

    if let (Some(inc), Some(ch)) = (incumbent.published_at, challenger.published_at) {
        if inc != ch {
            return ch > inc;
        }
    }

    false
}

/// Additive ranking heuristic for a duplicate group. Only orders members; never filters.
pub fn quality_score(article: &Article, quality: &QualityConfig, now: DateTime<Utc>) -> f64 {
    let mut score = article.relevance() * RELEVANCE_WEIGHT;

    score += match article.content_len() {
        n if n > 500 => 20.0,
        n if n > 200 => 10.0,
        n if n > 100 => 5.0,
        _ => 0.0,
    };

    score += match article.source_type {
        SourceType::Feed => 15.0,
        SourceType::Newsletter => 10.0,
        SourceType::Social => 5.0,
    };

    if is_trusted(&article.source_name, &quality.trusted_sources) {
        score += TRUSTED_SOURCE_BONUS;
    }

    if let Some(ts) = article.published_at {
        let age = now.signed_duration_since(ts);
        if age <= Duration::days(1) {
            score += 10.0;
        } else if age <= Duration::days(3) {
            score += 5.0;
        }
    }

    score
}

fn is_trusted(source_name: &str, trusted: &[String]) -> bool {
    let name = source_name.to_lowercase();
    !name.is_empty()
        && trusted
            .iter()
            .any(|t| !t.is_empty() && name.contains(&t.to_lowercase()))
}

/// Fold a losing group member into the winner: tag union (capped) and, when the
/// loser's excerpt is much longer, its excerpt.
pub fn merge_into_winner(winner: &mut Article, loser: &Article, cfg: &DedupConfig) {
    for tag in &loser.tags {
        if winner.tags.len() >= cfg.max_merged_tags {
            break;
        }
        winner.add_tag(tag);
    }

    let winner_len = winner.content_len() as f64;
    if loser.content_len() as f64 > winner_len * cfg.longer_content_ratio {
        winner.content_excerpt = loser.content_excerpt.clone();
    }
}
