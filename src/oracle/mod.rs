// src/oracle/mod.rs
//! Ranking oracle boundary: provider trait, typed errors and the provider factory.
//!
//! An oracle only turns a batch of compact article descriptions into a textual reply.
//! Decoding that reply (and falling back when it is unusable) is the caller's job,
//! see [`crate::select`].

pub mod cache;
pub mod decode;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::OracleConfig;
use cache::TtlCache;
use openai::OpenAiOracle;

pub use decode::{lenient_decode, strip_code_fences, DecodeError};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("ranking oracle is disabled")]
    Disabled,
    #[error("no API key in ${0}")]
    MissingKey(String),
    #[error("oracle transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned HTTP {0}")]
    Status(u16),
    #[error("oracle returned an empty reply")]
    EmptyReply,
    #[error("oracle daily limit of {0} calls reached")]
    LimitReached(u32),
}

/// Textual ranking capability used by both selection stages.
///
/// `batch` holds one compact description per candidate, already prefixed with its
/// batch-local index. `pick` is how many items the caller wants back.
#[async_trait]
pub trait RankingOracle: Send + Sync {
    /// Shortlist reply: `{"selected_indices": [...]}`.
    async fn rank(&self, batch: &[String], pick: usize) -> Result<String, OracleError>;

    /// Final reply: indices plus `daily_summary`, `key_insights` and `article_summaries`.
    async fn enrich(&self, batch: &[String], pick: usize) -> Result<String, OracleError>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

pub type DynOracle = Arc<dyn RankingOracle>;

/// Always fails; every batch takes the deterministic fallback.
pub struct DisabledOracle;

#[async_trait]
impl RankingOracle for DisabledOracle {
    async fn rank(&self, _batch: &[String], _pick: usize) -> Result<String, OracleError> {
        Err(OracleError::Disabled)
    }

    async fn enrich(&self, _batch: &[String], _pick: usize) -> Result<String, OracleError> {
        Err(OracleError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns canned replies. Handy for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedOracle {
    pub rank_reply: String,
    pub enrich_reply: String,
}

impl FixedOracle {
    pub fn new(rank_reply: impl Into<String>, enrich_reply: impl Into<String>) -> Self {
        Self {
            rank_reply: rank_reply.into(),
            enrich_reply: enrich_reply.into(),
        }
    }
}

#[async_trait]
impl RankingOracle for FixedOracle {
    async fn rank(&self, _batch: &[String], _pick: usize) -> Result<String, OracleError> {
        Ok(self.rank_reply.clone())
    }

    async fn enrich(&self, _batch: &[String], _pick: usize) -> Result<String, OracleError> {
        Ok(self.enrich_reply.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Build the oracle described by config.
///
/// * `enabled = false` -> [`DisabledOracle`]
/// * `provider = "openai"` -> [`OpenAiOracle`] with its own reply cache
/// * anything else, or a client that fails to build -> [`DisabledOracle`]
pub fn build_oracle(cfg: &OracleConfig) -> DynOracle {
    if !cfg.enabled {
        info!("ranking oracle disabled; selections will use fallback");
        return Arc::new(DisabledOracle);
    }

    match cfg.provider.as_str() {
        "openai" => {
            let cache = Arc::new(TtlCache::new(Duration::from_secs(cfg.cache_ttl_secs)));
            match OpenAiOracle::from_config(cfg, cache) {
                Ok(o) => {
                    info!(
                        shortlist_model = %cfg.shortlist_model,
                        final_model = %cfg.final_model,
                        "ranking oracle ready"
                    );
                    Arc::new(o)
                }
                Err(e) => {
                    warn!(error = %e, "ranking oracle unavailable; using fallback");
                    Arc::new(DisabledOracle)
                }
            }
        }
        other => {
            warn!(provider = other, "unknown oracle provider; using fallback");
            Arc::new(DisabledOracle)
        }
    }
}
