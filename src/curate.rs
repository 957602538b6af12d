// src/curate.rs
//! Pipeline sequencing: dedup -> diversity -> shortlist -> final.
//!
//! `run` never fails. Oracle trouble shows up as `mode = degraded` plus counts,
//! an empty pool as `mode = empty`.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::article::Article;
use crate::config::CurationConfig;
use crate::dedup::{DedupReport, Deduplicator};
use crate::diversity::DiversityFilter;
use crate::oracle::RankingOracle;
use crate::select::StageSelector;

pub const EMPTY_SUMMARY: &str = "No articles available for digest";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub input: usize,
    pub after_dedup: usize,
    pub after_diversity: usize,
    pub shortlist: usize,
    #[serde(rename = "final")]
    pub final_count: usize,
}

/// Whether a human should double-check the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurationMode {
    /// Every oracle call produced a usable reply.
    Curated,
    /// At least one batch (or the final stage) used the fallback pick.
    Degraded,
    /// Nothing to curate.
    Empty,
}

impl CurationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CurationMode::Curated => "curated",
            CurationMode::Degraded => "degraded",
            CurationMode::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationResult {
    pub selected: Vec<Article>,
    pub narrative_summary: String,
    pub key_insights: Vec<String>,
    pub stage_counts: StageCounts,
    pub mode: CurationMode,
    pub degraded_batches: usize,
    pub dedup: DedupReport,
    pub generated_at: DateTime<Utc>,
}

impl CurationResult {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            selected: Vec::new(),
            narrative_summary: EMPTY_SUMMARY.to_string(),
            key_insights: Vec::new(),
            stage_counts: StageCounts::default(),
            mode: CurationMode::Empty,
            degraded_batches: 0,
            dedup: DedupReport::default(),
            generated_at,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.mode == CurationMode::Degraded
    }

    /// Plain-text digest: summary, bulleted insights, numbered selection.
    pub fn digest_text(&self) -> String {
        let mut out = String::new();
        out.push_str(self.narrative_summary.trim());
        out.push('\n');
        if !self.key_insights.is_empty() {
            out.push_str("\nKEY INSIGHTS:\n");
            for insight in &self.key_insights {
                let _ = writeln!(out, "• {insight}");
            }
        }
        if !self.selected.is_empty() {
            out.push_str("\nSELECTED ARTICLES:\n");
            for (i, a) in self.selected.iter().enumerate() {
                let _ = writeln!(out, "{}. {} ({})", i + 1, a.title, a.source_name);
            }
        }
        out
    }

    pub fn selected_urls(&self) -> Vec<String> {
        self.selected
            .iter()
            .filter(|a| !a.url.trim().is_empty())
            .map(|a| a.url.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurationOrchestrator {
    dedup: Deduplicator,
    diversity: DiversityFilter,
    selector: StageSelector,
}

impl CurationOrchestrator {
    pub fn new(cfg: &CurationConfig) -> Self {
        Self {
            dedup: Deduplicator::from_config(cfg),
            diversity: DiversityFilter::from_config(cfg),
            selector: StageSelector::from_config(cfg),
        }
    }

    pub async fn run(
        &self,
        raw_pool: Vec<Article>,
        recently_selected: &HashSet<String>,
        oracle: &dyn RankingOracle,
    ) -> CurationResult {
        self.run_at(raw_pool, recently_selected, oracle, Utc::now())
            .await
    }

    /// Deterministic variant: `now` drives recency bonuses, undated-article ordering
    /// and the fallback summary date.
    pub async fn run_at(
        &self,
        raw_pool: Vec<Article>,
        recently_selected: &HashSet<String>,
        oracle: &dyn RankingOracle,
        now: DateTime<Utc>,
    ) -> CurationResult {
        crate::metrics::describe_metrics();

        if raw_pool.is_empty() {
            info!("empty article pool; nothing to curate");
            counter!("curation_runs_total", "mode" => CurationMode::Empty.as_str()).increment(1);
            return CurationResult::empty(now);
        }

        let mut counts = StageCounts {
            input: raw_pool.len(),
            ..Default::default()
        };

        let (deduped, dedup_report) = self.dedup.dedupe_with_report(raw_pool, now);
        counts.after_dedup = deduped.len();

        let diverse = self.diversity.filter_at(deduped, recently_selected, now);
        counts.after_diversity = diverse.len();

        if diverse.is_empty() {
            info!(input = counts.input, "all articles filtered before selection");
            let mut result = CurationResult::empty(now);
            result.stage_counts = counts;
            result.dedup = dedup_report;
            record_run(&result);
            return result;
        }

        let shortlist = self.selector.shortlist(&diverse, oracle).await;
        counts.shortlist = shortlist.selected.len();

        let fin = self
            .selector
            .final_select(&shortlist.selected, oracle, now.date_naive())
            .await;
        counts.final_count = fin.selected.len();

        let degraded_batches = shortlist.degraded_batches + usize::from(fin.degraded);
        let mode = if degraded_batches > 0 {
            CurationMode::Degraded
        } else {
            CurationMode::Curated
        };
        if mode == CurationMode::Degraded {
            warn!(
                degraded_batches,
                "curation finished in degraded mode; manual review needed"
            );
        }

        let result = CurationResult {
            selected: fin.selected,
            narrative_summary: fin.narrative_summary,
            key_insights: fin.key_insights,
            stage_counts: counts,
            mode,
            degraded_batches,
            dedup: dedup_report,
            generated_at: now,
        };
        record_run(&result);
        result
    }
}

fn record_run(result: &CurationResult) {
    let c = result.stage_counts;
    counter!("curation_runs_total", "mode" => result.mode.as_str()).increment(1);
    gauge!("curation_stage_count", "stage" => "input").set(c.input as f64);
    gauge!("curation_stage_count", "stage" => "after_dedup").set(c.after_dedup as f64);
    gauge!("curation_stage_count", "stage" => "after_diversity").set(c.after_diversity as f64);
    gauge!("curation_stage_count", "stage" => "shortlist").set(c.shortlist as f64);
    gauge!("curation_stage_count", "stage" => "final").set(c.final_count as f64);
    info!(
        mode = result.mode.as_str(),
        input = c.input,
        after_dedup = c.after_dedup,
        after_diversity = c.after_diversity,
        shortlist = c.shortlist,
        final_count = c.final_count,
        "curation run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::SourceType;
    use crate::oracle::{DisabledOracle, FixedOracle};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_pool_is_explicit_empty_result() {
        let o = CurationOrchestrator::default();
        let r = o.run_at(vec![], &HashSet::new(), &DisabledOracle, now()).await;
        assert_eq!(r.mode, CurationMode::Empty);
        assert_eq!(r.stage_counts, StageCounts::default());
        assert_eq!(r.digest_text(), format!("{EMPTY_SUMMARY}\n"));
    }

    #[tokio::test]
    async fn all_recent_yields_empty_with_counts() {
        let o = CurationOrchestrator::default();
        let pool = vec![Article::new("Only story", SourceType::Feed).with_url("https://a.com/x")];
        let recent: HashSet<String> = ["https://a.com/x".to_string()].into();
        let r = o.run_at(pool, &recent, &DisabledOracle, now()).await;
        assert_eq!(r.mode, CurationMode::Empty);
        assert_eq!(r.stage_counts.input, 1);
        assert_eq!(r.stage_counts.after_dedup, 1);
        assert_eq!(r.stage_counts.after_diversity, 0);
    }

    #[tokio::test]
    async fn fixed_oracle_run_is_curated_and_rendered() {
        let o = CurationOrchestrator::default();
        let pool = vec![
            Article::new("Chip exports tighten", SourceType::Feed)
                .with_url("https://a.com/1")
                .with_source("Wire"),
            Article::new("Robot startup raises funds", SourceType::Newsletter)
                .with_url("https://b.com/2")
                .with_source("Letter"),
        ];
        let oracle = FixedOracle::new(
            r#"{"selected_indices":[1,0]}"#,
            r#"{"selected_indices":[0],"daily_summary":"Robots.","key_insights":["Funding is back"]}"#,
        );
        let r = o.run_at(pool, &HashSet::new(), &oracle, now()).await;
        assert_eq!(r.mode, CurationMode::Curated);
        assert_eq!(r.stage_counts.shortlist, 2);
        assert_eq!(r.stage_counts.final_count, 1);
        assert_eq!(
            r.digest_text(),
            "Robots.\n\nKEY INSIGHTS:\n• Funding is back\n\nSELECTED ARTICLES:\n1. Robot startup raises funds (Letter)\n"
        );
    }

    #[tokio::test]
    async fn same_input_same_result() {
        let o = CurationOrchestrator::default();
        let pool: Vec<Article> = (0..30)
            .map(|i| {
                Article::new(format!("Distinct headline number {i} about topic {}", i * 7), SourceType::Feed)
                    .with_url(format!("https://s{}.com/{i}", i % 4))
                    .with_source(format!("S{}", i % 4))
            })
            .collect();
        let a = o.run_at(pool.clone(), &HashSet::new(), &DisabledOracle, now()).await;
        let b = o.run_at(pool, &HashSet::new(), &DisabledOracle, now()).await;
        assert_eq!(a, b);
        assert_eq!(a.mode, CurationMode::Degraded);
        assert_eq!(a.degraded_batches, 2);
    }

    #[test]
    fn stage_counts_serialize_final_key() {
        let v = serde_json::to_value(StageCounts {
            final_count: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(v["final"], 3);
    }
}
