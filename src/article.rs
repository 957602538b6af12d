// src/article.rs
//! Article record shared by acquisition, dedup, diversity and the oracle stages.
//!
//! Every field except `title` and `source_type` may be missing, `null` or ill-typed on
//! input and defaults safely (`""`, empty tags, score 50.0, no timestamp).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Score used when a source did not provide one (or provided garbage).
pub const DEFAULT_RELEVANCE_SCORE: f64 = 50.0;

fn default_relevance() -> f64 {
    DEFAULT_RELEVANCE_SCORE
}

// Field-level decoders: `null` or an ill-typed value degrades to the field default
// instead of failing the whole article.

fn null_as_default<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_tags<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_score<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_RELEVANCE_SCORE))
}

fn lenient_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s.trim().parse::<DateTime<Utc>>().ok(),
        _ => None,
    })
}

fn lenient_metrics<'de, D>(d: D) -> Result<Option<SocialMetrics>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        v => serde_json::from_value(v).ok(),
    })
}

/// Where an article came from. Legacy names from older acquisition layers are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[serde(alias = "rss")]
    Feed,
    #[serde(alias = "twitter")]
    Social,
    #[serde(alias = "gmail_newsletter", alias = "email")]
    Newsletter,
}

impl SourceType {
    /// Merge priority: feed > newsletter > social.
    pub fn priority(self) -> u8 {
        match self {
            SourceType::Feed => 3,
            SourceType::Newsletter => 2,
            SourceType::Social => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Feed => "feed",
            SourceType::Social => "social",
            SourceType::Newsletter => "newsletter",
        }
    }
}

/// Engagement counters, only present for `social` items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialMetrics {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
    pub impressions: u64,
    pub engagement_score: Option<f64>,
}

impl SocialMetrics {
    /// Figure shown to the ranking oracle: the provided score, else total interactions.
    pub fn engagement(&self) -> f64 {
        self.engagement_score
            .unwrap_or((self.likes + self.retweets + self.replies + self.quotes) as f64)
    }
}

/// Structured fields synthesized by the final stage for one selected article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleNarrative {
    pub detailed_summary: String,
    pub key_quotes: Vec<String>,
    pub specific_data: Vec<String>,
    pub companies_mentioned: Vec<String>,
    pub business_impact: String,
    pub talking_points: Vec<String>,
}

impl ArticleNarrative {
    pub fn is_empty(&self) -> bool {
        self.detailed_summary.is_empty()
            && self.key_quotes.is_empty()
            && self.specific_data.is_empty()
            && self.companies_mentioned.is_empty()
            && self.business_impact.is_empty()
            && self.talking_points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub source_type: SourceType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_excerpt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    /// Stamped by acquisition; recency fallback when `published_at` is missing.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub acquired_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_relevance", deserialize_with = "lenient_score")]
    pub relevance_score: f64,
    #[serde(
        default,
        deserialize_with = "lenient_metrics",
        skip_serializing_if = "Option::is_none"
    )]
    pub social_metrics: Option<SocialMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<ArticleNarrative>,
}

impl Article {
    pub fn new(title: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            title: title.into(),
            source_type,
            content_excerpt: String::new(),
            url: String::new(),
            source_name: String::new(),
            published_at: None,
            acquired_at: None,
            tags: Vec::new(),
            relevance_score: DEFAULT_RELEVANCE_SCORE,
            social_metrics: None,
            narrative: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content_excerpt = content.into();
        self
    }

    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.relevance_score = score;
        self
    }

    pub fn with_published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Relevance clamped to [0,100]; non-finite values fall back to the default.
    pub fn relevance(&self) -> f64 {
        if self.relevance_score.is_finite() {
            self.relevance_score.clamp(0.0, 100.0)
        } else {
            DEFAULT_RELEVANCE_SCORE
        }
    }

    /// Length of the excerpt in characters (not bytes).
    pub fn content_len(&self) -> usize {
        self.content_excerpt.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.content_excerpt.split_whitespace().count()
    }

    /// Best known timestamp: published, else acquired.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.acquired_at)
    }

    /// Insert a tag unless already present, keeping insertion order.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }
}
