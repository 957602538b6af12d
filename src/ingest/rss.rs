// src/ingest/rss.rs
//! RSS 2.0 feed source, from a fixture string or over HTTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use super::{clean_text, ArticleSource};
use crate::article::{Article, SourceType};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

pub fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

pub struct RssSource {
    name: String,
    mode: Mode,
}

impl RssSource {
    pub fn from_fixture_str(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("digest-curator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building feed HTTP client")?;
        Ok(Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    /// Items without a title are skipped. The channel title names the source unless
    /// this source was given an explicit name.
    pub fn parse_items(&self, xml: &str) -> Result<Vec<Article>> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml for {}", self.name))?;

        let source_name = if self.name.is_empty() {
            rss.channel.title.as_deref().map(clean_text).unwrap_or_default()
        } else {
            self.name.clone()
        };

        let mut out = Vec::with_capacity(rss.channel.items.len());
        for it in rss.channel.items {
            let title = clean_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let mut a = Article::new(title, SourceType::Feed)
                .with_source(source_name.clone())
                .with_url(it.link.unwrap_or_default().trim())
                .with_content(clean_text(it.description.as_deref().unwrap_or_default()))
                .with_tags(
                    it.categories
                        .iter()
                        .map(|c| clean_text(c).to_lowercase())
                        .filter(|c| !c.is_empty()),
                );
            a.published_at = it.pub_date.as_deref().and_then(parse_rfc2822);
            out.push(a);
        }
        Ok(out)
    }
}

#[async_trait]
impl ArticleSource for RssSource {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("fetching feed {url}"))?
                    .text()
                    .await
                    .with_context(|| format!("reading feed body {url}"))?;
                self.parse_items(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Named HTML entities are not valid XML; fold the common ones before parsing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
