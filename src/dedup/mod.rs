// src/dedup/mod.rs
//! Four-pass deduplication of the raw daily pool.
//!
//! 1. exact URL (normalized; empty URLs bypass)
//! 2. near-identical title
//! 3. content hash, then combined title/content similarity with the replacement policy
//! 4. cross-source grouping by title key, keeping the best member and merging the rest into it
//!
//! Pure, no I/O, deterministic for a given input order and `now`.

pub mod policy;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::article::Article;
use crate::config::{CurationConfig, DedupConfig, QualityConfig};
use crate::normalize::{content_hash, normalize_title, normalize_url, title_key};
use crate::similarity::SimilarityScorer;

pub use policy::{merge_into_winner, quality_score, should_replace};

const QUALITY_EPSILON: f64 = 1e-9;

/// How many articles each pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub input: usize,
    pub by_url: usize,
    pub by_title: usize,
    pub by_content: usize,
    pub by_group: usize,
    pub output: usize,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.by_url + self.by_title + self.by_content + self.by_group
    }
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    cfg: DedupConfig,
    quality: QualityConfig,
    scorer: SimilarityScorer,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default(), QualityConfig::default())
    }
}

impl Deduplicator {
    pub fn new(cfg: DedupConfig, quality: QualityConfig) -> Self {
        let scorer = SimilarityScorer::new(cfg.max_compare_chars);
        Self {
            cfg,
            quality,
            scorer,
        }
    }

    pub fn from_config(cfg: &CurationConfig) -> Self {
        Self::new(cfg.dedup.clone(), cfg.quality.clone())
    }

    pub fn config(&self) -> &DedupConfig {
        &self.cfg
    }

    pub fn dedupe(&self, articles: Vec<Article>) -> Vec<Article> {
        self.dedupe_at(articles, Utc::now())
    }

    /// Same as [`dedupe`](Self::dedupe) with an explicit clock for the recency bonus.
    pub fn dedupe_at(&self, articles: Vec<Article>, now: DateTime<Utc>) -> Vec<Article> {
        self.dedupe_with_report(articles, now).0
    }

    pub fn dedupe_with_report(
        &self,
        articles: Vec<Article>,
        now: DateTime<Utc>,
    ) -> (Vec<Article>, DedupReport) {
        let mut report = DedupReport {
            input: articles.len(),
            ..Default::default()
        };

        let pool = self.drop_url_duplicates(articles, &mut report);
        let pool = self.drop_title_duplicates(pool, &mut report);
        let pool = self.drop_content_duplicates(pool, &mut report);
        let pool = self.merge_groups(pool, now, &mut report);
        report.output = pool.len();

        counter!("dedup_removed_total", "step" => "url").increment(report.by_url as u64);
        counter!("dedup_removed_total", "step" => "title").increment(report.by_title as u64);
        counter!("dedup_removed_total", "step" => "content").increment(report.by_content as u64);
        counter!("dedup_removed_total", "step" => "group").increment(report.by_group as u64);
        info!(
            input = report.input,
            by_url = report.by_url,
            by_title = report.by_title,
            by_content = report.by_content,
            by_group = report.by_group,
            kept = report.output,
            "dedup finished"
        );

        (pool, report)
    }

    fn drop_url_duplicates(&self, articles: Vec<Article>, report: &mut DedupReport) -> Vec<Article> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::with_capacity(articles.len());
        for a in articles {
            let key = normalize_url(&a.url);
            if !key.is_empty() && !seen.insert(key) {
                report.by_url += 1;
                debug!(title = %short(&a.title), "dropped: duplicate url");
                continue;
            }
            out.push(a);
        }
        out
    }

    fn drop_title_duplicates(
        &self,
        articles: Vec<Article>,
        report: &mut DedupReport,
    ) -> Vec<Article> {
        let mut accepted: Vec<String> = Vec::new();
        let mut out = Vec::with_capacity(articles.len());
        for a in articles {
            let title = normalize_title(&a.title);
            let dup = accepted
                .iter()
                .any(|t| self.scorer.text_similarity(&title, t) > self.cfg.title_threshold);
            if dup {
                report.by_title += 1;
                debug!(title = %short(&a.title), "dropped: near-identical title");
                continue;
            }
            accepted.push(title);
            out.push(a);
        }
        out
    }

    fn drop_content_duplicates(
        &self,
        articles: Vec<Article>,
        report: &mut DedupReport,
    ) -> Vec<Article> {
        let mut hashes: HashSet<String> = HashSet::new();
        let mut kept: Vec<Article> = Vec::with_capacity(articles.len());

        for a in articles {
            if a.content_excerpt.trim().is_empty() {
                kept.push(a);
                continue;
            }

            let hash = content_hash(&a.content_excerpt);
            if hashes.contains(&hash) {
                report.by_content += 1;
                debug!(title = %short(&a.title), "dropped: identical content");
                continue;
            }

            // The first similar kept article decides. If the challenger wins it takes
            // that slot and, as the survivor, keeps scanning the rest of `kept`.
            let mut challenger = Some(a);
            let mut slot: Option<usize> = None;
            let mut i = 0;
            while i < kept.len() {
                if slot == Some(i) {
                    i += 1;
                    continue;
                }
                let (similar, survivor_wins) = {
                    let survivor = match (slot, challenger.as_ref()) {
                        (Some(s), _) => &kept[s],
                        (None, Some(c)) => c,
                        (None, None) => break,
                    };
                    let similar = self.scorer.article_similarity(&kept[i], survivor)
                        > self.cfg.similarity_threshold;
                    let wins =
                        similar && should_replace(&kept[i], survivor, self.cfg.min_content_gain);
                    (similar, wins)
                };
                if !similar {
                    i += 1;
                    continue;
                }

                report.by_content += 1;
                match (slot, survivor_wins) {
                    (None, true) => {
                        if let Some(c) = challenger.take() {
                            debug!(
                                kept = %short(&c.title),
                                replaced = %short(&kept[i].title),
                                "near-duplicate replaced incumbent"
                            );
                            kept[i] = c;
                        }
                        hashes.insert(hash.clone());
                        slot = Some(i);
                        i += 1;
                    }
                    (None, false) => {
                        if let Some(c) = challenger.take() {
                            debug!(title = %short(&c.title), "dropped: near-duplicate");
                        }
                        break;
                    }
                    (Some(_), true) => {
                        let gone = kept.remove(i);
                        debug!(title = %short(&gone.title), "dropped: near-duplicate of survivor");
                    }
                    (Some(s), false) => {
                        // `s < i`: the later article now survives and shifts down by one.
                        let gone = kept.remove(s);
                        debug!(title = %short(&gone.title), "dropped: survivor beaten further on");
                        slot = Some(i - 1);
                    }
                }
            }

            if let Some(c) = challenger {
                hashes.insert(hash);
                kept.push(c);
            }
        }
        kept
    }

    fn merge_groups(
        &self,
        articles: Vec<Article>,
        now: DateTime<Utc>,
        report: &mut DedupReport,
    ) -> Vec<Article> {
        // Buckets in first-seen order; articles without a usable key stand alone.
        let mut buckets: Vec<Vec<Article>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for a in articles {
            let key = title_key(&normalize_title(&a.title));
            if key.is_empty() {
                buckets.push(vec![a]);
                continue;
            }
            match index.get(&key) {
                Some(&i) => buckets[i].push(a),
                None => {
                    index.insert(key, buckets.len());
                    buckets.push(vec![a]);
                }
            }
        }

        let mut out = Vec::with_capacity(buckets.len());
        for mut group in buckets {
            if group.len() == 1 {
                out.extend(group);
                continue;
            }

            let best = self.pick_group_winner(&group, now);
            let mut winner = group.swap_remove(best);
            // swap_remove moved the last member into `best`; restore input order for merging.
            if best < group.len() {
                let moved = group.remove(best);
                group.push(moved);
            }
            for loser in &group {
                merge_into_winner(&mut winner, loser, &self.cfg);
            }
            report.by_group += group.len();
            debug!(
                kept = %short(&winner.title),
                merged = group.len(),
                "merged cross-source group"
            );
            out.push(winner);
        }
        out
    }

    fn pick_group_winner(&self, group: &[Article], now: DateTime<Utc>) -> usize {
        let mut best = 0;
        let mut best_q = quality_score(&group[0], &self.quality, now);
        for (i, a) in group.iter().enumerate().skip(1) {
            let q = quality_score(a, &self.quality, now);
            let better = if (q - best_q).abs() <= QUALITY_EPSILON {
                should_replace(&group[best], a, self.cfg.min_content_gain)
            } else {
                q > best_q
            };
            if better {
                best = i;
                best_q = q;
            }
        }
        best
    }
}

/// Titles are truncated in logs.
fn short(title: &str) -> String {
    title.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::SourceType;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn art(title: &str, url: &str) -> Article {
        Article::new(title, SourceType::Feed).with_url(url)
    }

    #[test]
    fn empty_urls_bypass_url_pass() {
        let d = Deduplicator::default();
        let (out, rep) = d.dedupe_with_report(
            vec![
                art("Chip export rules tighten", ""),
                art("Robotics startup raises funds", ""),
            ],
            now(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(rep.by_url, 0);
    }

    #[test]
    fn tracking_params_collapse_first_seen_wins() {
        let d = Deduplicator::default();
        let a = art("First", "https://x.com/a?utm_source=y").with_score(70.0);
        let b = art("Second", "https://x.com/a").with_score(90.0);
        let (out, rep) = d.dedupe_with_report(vec![a, b], now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "First");
        assert_eq!(rep.by_url, 1);
    }

    #[test]
    fn near_identical_titles_drop_later() {
        let d = Deduplicator::default();
        let (out, rep) = d.dedupe_with_report(
            vec![
                art("Nvidia unveils new AI chip", "https://a.com/1"),
                art("BREAKING: Nvidia unveils new AI chip | Wire", "https://b.com/2"),
            ],
            now(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://a.com/1");
        assert_eq!(rep.by_title, 1);
    }

    #[test]
    fn identical_content_is_dropped_by_hash() {
        let d = Deduplicator::default();
        let body = "Regulators in Brussels published the final text of the act today.";
        let (out, rep) = d.dedupe_with_report(
            vec![
                art("EU finalises AI act", "https://a.com/1").with_content(body),
                art("Quantum networking trial succeeds", "https://b.com/2")
                    .with_content(body.to_uppercase()),
            ],
            now(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(rep.by_content, 1);
    }

    #[test]
    fn near_duplicate_replaced_by_feed_on_tie() {
        let cfg = DedupConfig {
            title_threshold: 1.0,
            ..DedupConfig::default()
        };
        let d = Deduplicator::new(cfg, QualityConfig::default());
        let content = "OpenAI released a new reasoning model for enterprise customers";
        let social = Article::new("OpenAI releases new reasoning model", SourceType::Social)
            .with_url("https://s.com/1")
            .with_content(content);
        let feed = Article::new("OpenAI releases new reasoning model!", SourceType::Feed)
            .with_url("https://f.com/1")
            .with_content(format!("{content}."));
        let out = d.dedupe_at(vec![social, feed], now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_type, SourceType::Feed);
    }

    #[test]
    fn group_merge_keeps_best_and_unions_tags() {
        let d = Deduplicator::default();
        let low = Article::new("Apple buys AI startup for search", SourceType::Social)
            .with_url("https://s.com/1")
            .with_tags(["apple"])
            .with_content("brief")
            .with_score(40.0);
        let high = Article::new("Apple buys AI startup for search, sources say", SourceType::Feed)
            .with_url("https://f.com/1")
            .with_tags(["m&a"])
            .with_content("Cupertino confirmed the deal late on Tuesday.")
            .with_score(80.0);
        let (out, rep) = d.dedupe_with_report(vec![low, high], now());
        assert_eq!(out.len(), 1, "{out:?}");
        assert_eq!(out[0].url, "https://f.com/1");
        assert_eq!(out[0].tags, vec!["m&a", "apple"]);
        assert_eq!(rep.by_group, 1);
    }

    #[test]
    fn idempotent_on_mixed_pool() {
        let d = Deduplicator::default();
        let pool = vec![
            art("AI Breakthrough", "http://x.com/a?utm=1").with_score(85.0),
            art("AI Breakthrough", "http://x.com/a").with_score(85.0),
            art("Totally Unrelated Story", "http://y.com/b").with_score(60.0),
            art("Update: Totally unrelated story", "").with_content("body"),
        ];
        let once = d.dedupe_at(pool.clone(), now());
        assert!(once.len() <= pool.len());
        let twice = d.dedupe_at(once.clone(), now());
        assert_eq!(once, twice);
    }
}
