// src/select.rs
//! Oracle-backed selection, used twice: shortlist (batched) and final (one batch, enriched).
//!
//! Every oracle failure, unusable reply or missing key drops that batch to a deterministic
//! fallback pick. Nothing here returns an error.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::article::{Article, ArticleNarrative, SourceType};
use crate::config::{CurationConfig, FallbackOrder, FinalStageConfig, ShortlistConfig};
use crate::oracle::{lenient_decode, RankingOracle};

pub const FALLBACK_INSIGHT: &str = "Fallback mode - manual review needed";

#[derive(Debug, Deserialize)]
struct ShortlistReply {
    selected_indices: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct FinalReply {
    selected_indices: Vec<i64>,
    daily_summary: String,
    key_insights: Vec<String>,
    #[serde(default)]
    article_summaries: Vec<ArticleNarrative>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortlistOutcome {
    pub selected: Vec<Article>,
    pub batches: usize,
    pub degraded_batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalOutcome {
    /// Selected articles with `narrative` attached where the oracle provided one.
    pub selected: Vec<Article>,
    pub narrative_summary: String,
    pub key_insights: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug)]
struct BatchPick {
    /// Indices into the whole candidate list.
    indices: Vec<usize>,
    degraded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StageSelector {
    shortlist: ShortlistConfig,
    final_stage: FinalStageConfig,
}

impl StageSelector {
    pub fn new(shortlist: ShortlistConfig, final_stage: FinalStageConfig) -> Self {
        Self {
            shortlist,
            final_stage,
        }
    }

    pub fn from_config(cfg: &CurationConfig) -> Self {
        Self::new(cfg.shortlist.clone(), cfg.final_stage.clone())
    }

    /// Shortlist stage with configured batch size and targets.
    pub async fn shortlist(
        &self,
        candidates: &[Article],
        oracle: &dyn RankingOracle,
    ) -> ShortlistOutcome {
        self.select(
            candidates,
            self.shortlist.batch_size,
            self.shortlist.target_count,
            oracle,
        )
        .await
    }

    /// Batched ranking: per-batch picks are offset by the batch start, concatenated in
    /// batch order and truncated to `target_count`.
    pub async fn select(
        &self,
        candidates: &[Article],
        batch_size: usize,
        target_count: usize,
        oracle: &dyn RankingOracle,
    ) -> ShortlistOutcome {
        if candidates.is_empty() {
            return ShortlistOutcome::default();
        }

        let batch_size = batch_size.max(1);
        let per_batch = self.shortlist.per_batch_for(target_count);
        let excerpt_chars = self.shortlist.excerpt_chars;
        let order = self.shortlist.fallback_order;

        let batches: Vec<(usize, &[Article])> = candidates
            .chunks(batch_size)
            .enumerate()
            .map(|(i, chunk)| (i * batch_size, chunk))
            .collect();
        let batch_count = batches.len();

        let calls: Vec<_> = batches
            .into_iter()
            .map(|(start, chunk)| async move {
                let reps = represent(chunk, excerpt_chars);
                let reply = match oracle.rank(&reps, per_batch).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(batch_start = start, oracle = oracle.name(), error = %e, "shortlist oracle call failed; using fallback");
                        return fallback_batch(chunk, start, per_batch, order);
                    }
                };
                match lenient_decode::<ShortlistReply>(&reply) {
                    Ok(r) => BatchPick {
                        indices: valid_indices(&r.selected_indices, chunk.len())
                            .into_iter()
                            .map(|i| start + i)
                            .collect(),
                        degraded: false,
                    },
                    Err(e) => {
                        warn!(batch_start = start, error = %e, "shortlist reply unusable; using fallback");
                        fallback_batch(chunk, start, per_batch, order)
                    }
                }
            })
            .collect();

        // `buffered` keeps batch order no matter which call finishes first.
        let picks: Vec<BatchPick> = stream::iter(calls)
            .buffered(self.shortlist.concurrency.max(1))
            .collect()
            .await;

        let degraded_batches = picks.iter().filter(|p| p.degraded).count();
        let selected: Vec<Article> = picks
            .into_iter()
            .flat_map(|p| p.indices)
            .take(target_count)
            .map(|i| candidates[i].clone())
            .collect();

        if degraded_batches > 0 {
            counter!("curation_degraded_batches_total", "stage" => "shortlist")
                .increment(degraded_batches as u64);
        }
        info!(
            candidates = candidates.len(),
            batches = batch_count,
            degraded_batches,
            selected = selected.len(),
            "shortlist stage finished"
        );

        ShortlistOutcome {
            selected,
            batches: batch_count,
            degraded_batches,
        }
    }

    /// Final stage: one batch, enriched with summary, insights and per-article narrative.
    /// `date` only feeds the fallback summary line.
    pub async fn final_select(
        &self,
        candidates: &[Article],
        oracle: &dyn RankingOracle,
        date: NaiveDate,
    ) -> FinalOutcome {
        if candidates.is_empty() {
            return FinalOutcome::default();
        }
        let target = self.final_stage.target_count.max(1);
        let reps = represent(candidates, self.final_stage.excerpt_chars);

        let decoded = match oracle.enrich(&reps, target).await {
            Ok(reply) => lenient_decode::<FinalReply>(&reply).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let reply = match decoded {
            Ok(r) => r,
            Err(error) => {
                warn!(oracle = oracle.name(), %error, "final selection failed; using fallback");
                counter!("curation_degraded_batches_total", "stage" => "final").increment(1);
                return self.final_fallback(candidates, target, date);
            }
        };

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for (pos, raw) in reply.selected_indices.iter().enumerate() {
            let Some(idx) = in_range(*raw, candidates.len()) else {
                continue;
            };
            if !seen.insert(idx) {
                continue;
            }
            let mut a = candidates[idx].clone();
            if let Some(n) = reply.article_summaries.get(pos) {
                if !n.is_empty() {
                    a.narrative = Some(n.clone());
                }
            }
            selected.push(a);
            if selected.len() == target {
                break;
            }
        }

        info!(
            candidates = candidates.len(),
            selected = selected.len(),
            insights = reply.key_insights.len(),
            "final stage finished"
        );

        FinalOutcome {
            selected,
            narrative_summary: reply.daily_summary.trim().to_string(),
            key_insights: reply.key_insights,
            degraded: false,
        }
    }

    fn final_fallback(&self, candidates: &[Article], target: usize, date: NaiveDate) -> FinalOutcome {
        let selected: Vec<Article> = fallback_order(candidates, self.shortlist.fallback_order)
            .into_iter()
            .take(target)
            .map(|i| candidates[i].clone())
            .collect();
        FinalOutcome {
            narrative_summary: format!(
                "Daily digest for {date}: {} articles selected (fallback mode)",
                selected.len()
            ),
            key_insights: vec![FALLBACK_INSIGHT.to_string()],
            selected,
            degraded: true,
        }
    }
}

fn represent(batch: &[Article], excerpt_chars: usize) -> Vec<String> {
    batch
        .iter()
        .enumerate()
        .map(|(i, a)| compact_representation(i, a, excerpt_chars))
        .collect()
}

/// One candidate as shown to the oracle, prefixed with its batch-local index.
pub fn compact_representation(index: usize, article: &Article, excerpt_chars: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{index}] TITLE: {}", article.title);
    let _ = writeln!(
        out,
        "SOURCE: {} ({})",
        article.source_name,
        article.source_type.as_str()
    );
    let excerpt: String = article.content_excerpt.chars().take(excerpt_chars).collect();
    let ellipsis = if article.content_len() > excerpt_chars { "..." } else { "" };
    let _ = writeln!(out, "CONTENT: {excerpt}{ellipsis}");
    let _ = writeln!(out, "URL: {}", article.url);
    if !article.tags.is_empty() {
        let _ = writeln!(out, "TAGS: {}", article.tags.join(", "));
    }
    if let Some(ts) = article.published_at {
        let _ = writeln!(out, "PUBLISHED: {}", ts.format("%Y-%m-%d"));
    }
    if article.source_type == SourceType::Social {
        let engagement = article
            .social_metrics
            .as_ref()
            .map(|m| m.engagement())
            .unwrap_or(0.0);
        let _ = writeln!(out, "ENGAGEMENT: {engagement}");
    }
    out
}

fn in_range(raw: i64, len: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|i| *i < len)
}

/// In-range, first occurrence only, reply order preserved.
fn valid_indices(raw: &[i64], len: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|r| in_range(*r, len))
        .filter(|i| seen.insert(*i))
        .collect()
}

/// Batch-local positions in fallback order.
fn fallback_order(batch: &[Article], order: FallbackOrder) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..batch.len()).collect();
    if order == FallbackOrder::Relevance {
        // Stable sort: equal relevance keeps input order.
        idx.sort_by(|a, b| batch[*b].relevance().total_cmp(&batch[*a].relevance()));
    }
    idx
}

fn fallback_batch(batch: &[Article], start: usize, pick: usize, order: FallbackOrder) -> BatchPick {
    BatchPick {
        indices: fallback_order(batch, order)
            .into_iter()
            .take(pick)
            .map(|i| start + i)
            .collect(),
        degraded: true,
    }
}
