// src/oracle/openai.rs
//! OpenAI chat-completions oracle: prompt rendering from the editorial brief,
//! reply cache, per-day call limit and request timeouts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::cache::{prompt_key, TtlCache};
use super::{OracleError, RankingOracle};
use crate::config::{Criterion, OracleConfig};

const SHORTLIST_MAX_TOKENS: u32 = 1000;
const FINAL_MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.1;

/// Real calls made today; cache hits do not count.
#[derive(Debug)]
struct DailyCounter {
    day: NaiveDate,
    count: u32,
}

impl DailyCounter {
    fn today() -> Self {
        Self {
            day: Utc::now().date_naive(),
            count: 0,
        }
    }

    fn roll(&mut self) {
        let today = Utc::now().date_naive();
        if self.day != today {
            self.day = today;
            self.count = 0;
        }
    }
}

pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    api_key_env: String,
    endpoint: String,
    shortlist_model: String,
    final_model: String,
    audience: String,
    criteria: Vec<Criterion>,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
    cache: Arc<TtlCache>,
}

impl OpenAiOracle {
    /// Reads the API key from the env var named in config. A missing key is not an
    /// error here; calls fail with [`OracleError::MissingKey`] and fall back.
    pub fn from_config(cfg: &OracleConfig, cache: Arc<TtlCache>) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent(concat!("digest-curator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building oracle HTTP client")?;
        Ok(Self {
            http,
            api_key,
            api_key_env: cfg.api_key_env.clone(),
            endpoint: cfg.endpoint.clone(),
            shortlist_model: cfg.shortlist_model.clone(),
            final_model: cfg.final_model.clone(),
            audience: cfg.audience.clone(),
            criteria: cfg.criteria.clone(),
            daily_limit: cfg.daily_limit,
            counter: Mutex::new(DailyCounter::today()),
            cache,
        })
    }

    /// Shared reply cache, for explicit invalidation by the owner.
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn shortlist_prompt(&self, batch: &[String], pick: usize) -> String {
        render_shortlist_prompt(&self.audience, &self.criteria, batch, pick)
    }

    pub fn final_prompt(&self, batch: &[String], pick: usize) -> String {
        render_final_prompt(&self.audience, &self.criteria, batch, pick)
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, OracleError> {
        let key = prompt_key(model, prompt);
        if let Some(hit) = self.cache.get(&key) {
            debug!(model, "oracle cache hit");
            return Ok(hit);
        }

        {
            let mut c = self.counter.lock().unwrap_or_else(|e| e.into_inner());
            c.roll();
            if c.count >= self.daily_limit {
                return Err(OracleError::LimitReached(self.daily_limit));
            }
        }

        if self.api_key.is_empty() {
            return Err(OracleError::MissingKey(self.api_key_env.clone()));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        let body: Resp = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(OracleError::EmptyReply);
        }

        {
            let mut c = self.counter.lock().unwrap_or_else(|e| e.into_inner());
            c.count = c.count.saturating_add(1);
        }
        self.cache.insert(key, content.clone());
        Ok(content)
    }
}

#[async_trait]
impl RankingOracle for OpenAiOracle {
    async fn rank(&self, batch: &[String], pick: usize) -> Result<String, OracleError> {
        let prompt = self.shortlist_prompt(batch, pick);
        self.complete(&self.shortlist_model, &prompt, SHORTLIST_MAX_TOKENS)
            .await
    }

    async fn enrich(&self, batch: &[String], pick: usize) -> Result<String, OracleError> {
        let prompt = self.final_prompt(batch, pick);
        self.complete(&self.final_model, &prompt, FINAL_MAX_TOKENS)
            .await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn render_criteria(criteria: &[Criterion]) -> String {
    let mut out = String::new();
    for (i, c) in criteria.iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({}%)", i + 1, c.label, c.weight);
    }
    out
}

pub fn render_shortlist_prompt(
    audience: &str,
    criteria: &[Criterion],
    batch: &[String],
    pick: usize,
) -> String {
    let pick = pick.min(batch.len());
    format!(
        "You are curating news for {audience}.\n\n\
         TASK: From these {n} articles, select the {pick} most relevant.\n\n\
         CRITERIA (in order of importance):\n{criteria}\n\
         ARTICLES:\n{articles}\n\n\
         RESPOND WITH JSON:\n\
         {{\n  \"selected_indices\": [0, 3, 7],\n  \"reasoning\": \"Brief explanation\"\n}}\n\n\
         Select exactly {pick} articles (or fewer if the batch is smaller). \
         Indices refer to the [n] markers above.",
        n = batch.len(),
        criteria = render_criteria(criteria),
        articles = batch.join("\n"),
    )
}

pub fn render_final_prompt(
    audience: &str,
    criteria: &[Criterion],
    batch: &[String],
    pick: usize,
) -> String {
    let pick = pick.min(batch.len());
    format!(
        "You are writing a daily digest for {audience}. Readers need enough detail \
         (quotes, figures, company names, context) to write about each story themselves.\n\n\
         TASK:\n\
         1. Select the {pick} most important articles from these {n} candidates.\n\
         2. Write a short executive summary of the day.\n\
         3. List a few discrete key insights.\n\
         4. For each selected article, in the same order as selected_indices, extract structured details.\n\n\
         CRITERIA (in order of importance):\n{criteria}\n\
         ARTICLES:\n{articles}\n\n\
         RESPOND WITH JSON:\n\
         {{\n  \"selected_indices\": [0, 2, 4],\n  \"daily_summary\": \"Executive summary\",\n  \
         \"key_insights\": [\"Insight with supporting data\"],\n  \"article_summaries\": [\n    {{\n      \
         \"detailed_summary\": \"4-6 sentence summary\",\n      \"key_quotes\": [\"Quote with attribution\"],\n      \
         \"specific_data\": [\"Funding amount: $X million\"],\n      \"companies_mentioned\": [\"Company\"],\n      \
         \"business_impact\": \"Why this matters\",\n      \"talking_points\": [\"Talking point\"]\n    }}\n  ]\n}}",
        n = batch.len(),
        criteria = render_criteria(criteria),
        articles = batch.join("\n"),
    )
}
