//! One-shot curation from a JSON article dump and/or RSS feeds.
//!
//! ```text
//! curate --input articles.json --feed https://example.com/rss --history history.json --out result.json
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

use digest_curator::ingest::{collect_all, ArticleSource, RssSource};
use digest_curator::oracle::build_oracle;
use digest_curator::store::{JsonFileStore, SelectionStore};
use digest_curator::{init_tracing, Article, CurationConfig, CurationOrchestrator};

#[derive(Debug, Parser)]
#[command(name = "curate", about = "Deduplicate and curate a daily article pool into a digest")]
struct Args {
    /// JSON array of articles
    #[arg(long)]
    input: Option<PathBuf>,

    /// RSS feed URL (repeatable)
    #[arg(long = "feed")]
    feeds: Vec<String>,

    /// Selection history file; read for recent exclusions and updated after the run
    #[arg(long)]
    history: Option<PathBuf>,

    /// Where to write the JSON result
    #[arg(long)]
    out: Option<PathBuf>,

    /// Config file (defaults to $CURATION_CONFIG_PATH or config/curation.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Articles from a JSON file on disk.
struct JsonArticles {
    path: PathBuf,
    name: String,
}

#[async_trait]
impl ArticleSource for JsonArticles {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    if args.input.is_none() && args.feeds.is_empty() {
        bail!("nothing to curate: pass --input and/or --feed");
    }

    let config = match &args.config {
        Some(p) => {
            let mut c = CurationConfig::from_path(p)?;
            c.apply_env_overrides();
            c.validate();
            c
        }
        None => CurationConfig::load()?,
    };

    let mut sources: Vec<Box<dyn ArticleSource>> = Vec::new();
    if let Some(path) = &args.input {
        sources.push(Box::new(JsonArticles {
            name: path.display().to_string(),
            path: path.clone(),
        }));
    }
    for url in &args.feeds {
        sources.push(Box::new(RssSource::from_url("", url.as_str())?));
    }

    let now = Utc::now();
    let pool = collect_all(&sources, now).await;

    let store = args.history.as_ref().map(JsonFileStore::new);
    let recent: HashSet<String> = match &store {
        Some(s) => s
            .recently_selected(config.diversity.lookback_days)
            .await
            .context("reading selection history")?,
        None => HashSet::new(),
    };

    let oracle = build_oracle(&config.oracle);
    let orchestrator = CurationOrchestrator::new(&config);
    let result = orchestrator
        .run_at(pool, &recent, oracle.as_ref(), now)
        .await;

    if let Some(s) = &store {
        s.record_selection(&result.selected_urls(), result.generated_at)
            .await
            .context("recording selection")?;
    }

    if let Some(out) = &args.out {
        let json = serde_json::to_vec_pretty(&result)?;
        tokio::fs::write(out, json)
            .await
            .with_context(|| format!("writing {}", out.display()))?;
        info!(path = %out.display(), "result written");
    }

    print!("{}", result.digest_text());
    if result.is_degraded() {
        eprintln!("warning: fallback selection used; manual review needed");
    }
    Ok(())
}
