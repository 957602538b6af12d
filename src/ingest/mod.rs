// src/ingest/mod.rs
//! Acquisition boundary: article sources, concurrent collection and text cleanup.

pub mod rss;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

use crate::article::Article;

pub use rss::RssSource;

/// Cap on cleaned text length, in characters.
pub const MAX_TEXT_CHARS: usize = 1500;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>>;
    fn name(&self) -> &str;
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Clean feed text: decode entities, strip tags, fold typographic quotes,
/// collapse whitespace, cap length.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let decoded = html_escape::decode_html_entities(s);

    // 2) Strip HTML tags
    let mut out = re_tags().replace_all(&decoded, " ").into_owned();

    // 3) “ ” « » -> ", ‘ ’ -> '
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out = re_ws().replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Fetch all sources concurrently. A failing source is logged and counted, never fatal.
///
/// Output keeps source order. Titles and excerpts are cleaned, untitled items dropped,
/// and `acquired_at` stamped where missing.
pub async fn collect_all(sources: &[Box<dyn ArticleSource>], now: DateTime<Utc>) -> Vec<Article> {
    crate::metrics::describe_metrics();

    let results = join_all(sources.iter().map(|s| s.fetch_latest())).await;

    let mut out = Vec::new();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(items) => {
                let fetched = items.len();
                let before = out.len();
                out.extend(items.into_iter().filter_map(|a| prepare(a, now)));
                info!(
                    source = source.name(),
                    fetched,
                    kept = out.len() - before,
                    "source fetched"
                );
            }
            Err(e) => {
                warn!(error = ?e, source = source.name(), "source error");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }
    out
}

fn prepare(mut a: Article, now: DateTime<Utc>) -> Option<Article> {
    a.title = clean_text(&a.title);
    if a.title.is_empty() {
        return None;
    }
    a.content_excerpt = clean_text(&a.content_excerpt);
    a.url = a.url.trim().to_string();
    if a.acquired_at.is_none() {
        a.acquired_at = Some(now);
    }
    Some(a)
}
