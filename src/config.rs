// src/config.rs
//! Curation settings: thresholds, batch sizes, targets and the editorial brief for the oracle.
//!
//! Resolution order:
//! 1) `$CURATION_CONFIG_PATH` (must exist if set)
//! 2) `config/curation.toml` (optional)
//! 3) built-in defaults
//!
//! Env overrides are applied on top, then `validate()` clamps everything into range.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/curation.toml";
pub const ENV_CONFIG_PATH: &str = "CURATION_CONFIG_PATH";

pub const ENV_DEDUP_THRESHOLD: &str = "CURATION_DEDUP_THRESHOLD";
pub const ENV_FINAL_TARGET: &str = "CURATION_FINAL_TARGET";
pub const ENV_SHORTLIST_TARGET: &str = "CURATION_SHORTLIST_TARGET";
pub const ENV_LOOKBACK_DAYS: &str = "CURATION_LOOKBACK_DAYS";
pub const ENV_ORACLE_ENABLED: &str = "CURATION_ORACLE_ENABLED";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub dedup: DedupConfig,
    pub quality: QualityConfig,
    pub diversity: DiversityConfig,
    pub shortlist: ShortlistConfig,
    pub final_stage: FinalStageConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Combined title/content similarity above which two articles are one story.
    pub similarity_threshold: f64,
    /// Title-only similarity above which the later article is dropped.
    pub title_threshold: f64,
    pub max_compare_chars: usize,
    pub max_merged_tags: usize,
    /// A losing duplicate's excerpt is adopted when it is this many times longer.
    pub longer_content_ratio: f64,
    /// Excerpt length difference that counts as decisive in the replacement policy.
    pub min_content_gain: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            title_threshold: 0.9,
            max_compare_chars: crate::similarity::DEFAULT_MAX_COMPARE_CHARS,
            max_merged_tags: 20,
            longer_content_ratio: 1.5,
            min_content_gain: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Lowercase substrings of source names that earn the trusted-source bonus.
    pub trusted_sources: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            trusted_sources: [
                "harvard business review",
                "mit technology review",
                "venturebeat",
                "techcrunch",
                "the register",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Trailing window for "recently selected" lookups.
    pub lookback_days: u32,
    /// Floor for the per-source cap.
    pub min_per_source: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            min_per_source: 2,
        }
    }
}

/// Order used to pick fallback items inside a batch when the oracle is unusable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackOrder {
    /// First N in input order.
    #[default]
    Input,
    /// Highest relevance first; ties keep input order.
    Relevance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortlistConfig {
    pub batch_size: usize,
    pub target_count: usize,
    /// How many items the oracle is asked to pick per batch (and fallback size).
    /// `None` means `target_count`.
    pub per_batch_target: Option<usize>,
    /// Max oracle calls in flight.
    pub concurrency: usize,
    pub excerpt_chars: usize,
    pub fallback_order: FallbackOrder,
}

impl Default for ShortlistConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            target_count: 20,
            per_batch_target: None,
            concurrency: 3,
            excerpt_chars: 300,
            fallback_order: FallbackOrder::Input,
        }
    }
}

impl ShortlistConfig {
    pub fn per_batch(&self) -> usize {
        self.per_batch_for(self.target_count)
    }

    /// Picks requested per batch when the stage target is `target_count`.
    pub fn per_batch_for(&self, target_count: usize) -> usize {
        self.per_batch_target.unwrap_or(target_count).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalStageConfig {
    pub target_count: usize,
    pub excerpt_chars: usize,
}

impl Default for FinalStageConfig {
    fn default() -> Self {
        Self {
            target_count: 5,
            excerpt_chars: 1000,
        }
    }
}

/// One weighted selection criterion rendered into oracle prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub label: String,
    /// Percentage weight.
    pub weight: u32,
}

impl Criterion {
    pub fn new(label: &str, weight: u32) -> Self {
        Self {
            label: label.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    /// Only "openai" is wired; anything else runs the disabled oracle.
    pub provider: String,
    pub shortlist_model: String,
    pub final_model: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Real calls per UTC day; cache hits are free.
    pub daily_limit: u32,
    pub cache_ttl_secs: u64,
    pub audience: String,
    pub criteria: Vec<Criterion>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            shortlist_model: "gpt-4o-mini".to_string(),
            final_model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            timeout_secs: 60,
            daily_limit: 50,
            cache_ttl_secs: 300,
            audience: "technology executives who need practical, vendor-neutral AI news"
                .to_string(),
            criteria: vec![
                Criterion::new("Business impact for executives", 40),
                Criterion::new("Data strategy and vendor independence", 30),
                Criterion::new("Actionable insight over pure research", 20),
                Criterion::new("Market trends and investment implications", 10),
            ],
        }
    }
}

impl CurationConfig {
    /// Load using env var + fallbacks, then apply env overrides and validate.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(p);
            if !path.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    path.display()
                ));
            }
            Self::from_path(&path)?
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                Self::from_path(&path)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.validate();
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading curation config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing curation config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: CurationConfig = toml::from_str(s)?;
        cfg.validate();
        Ok(cfg)
    }

    /// Apply `CURATION_*` env overrides; unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_unit_env(std::env::var(ENV_DEDUP_THRESHOLD).ok()) {
            self.dedup.similarity_threshold = t;
        }
        if let Some(n) = parse_count_env(std::env::var(ENV_FINAL_TARGET).ok()) {
            self.final_stage.target_count = n;
        }
        if let Some(n) = parse_count_env(std::env::var(ENV_SHORTLIST_TARGET).ok()) {
            self.shortlist.target_count = n;
        }
        if let Some(n) = parse_count_env(std::env::var(ENV_LOOKBACK_DAYS).ok()) {
            self.diversity.lookback_days = n.min(u32::MAX as usize) as u32;
        }
        if let Some(b) = parse_bool_env(std::env::var(ENV_ORACLE_ENABLED).ok()) {
            self.oracle.enabled = b;
        }
    }

    /// Clamp thresholds into [0,1] and force sizes to be usable.
    pub fn validate(&mut self) {
        let d = &mut self.dedup;
        d.similarity_threshold = unit_or(d.similarity_threshold, 0.85);
        d.title_threshold = unit_or(d.title_threshold, 0.9);
        d.max_compare_chars = d.max_compare_chars.max(1);
        if !d.longer_content_ratio.is_finite() || d.longer_content_ratio < 1.0 {
            d.longer_content_ratio = 1.5;
        }

        self.diversity.min_per_source = self.diversity.min_per_source.max(1);

        let s = &mut self.shortlist;
        s.batch_size = s.batch_size.max(1);
        s.target_count = s.target_count.max(1);
        s.concurrency = s.concurrency.clamp(1, 16);
        if let Some(p) = s.per_batch_target {
            s.per_batch_target = Some(p.max(1));
        }

        self.final_stage.target_count = self.final_stage.target_count.max(1);
    }
}

fn unit_or(v: f64, default: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        default
    }
}

fn parse_unit_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn parse_count_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn parse_bool_env(raw: Option<String>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
