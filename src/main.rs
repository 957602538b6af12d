//! Digest curator HTTP service.
//! Boots the Axum server with the curation pipeline, selection history and `/metrics`.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use digest_curator::metrics::Metrics;
use digest_curator::oracle::build_oracle;
use digest_curator::store::{DynStore, JsonFileStore, MemoryStore};
use digest_curator::{create_router, init_tracing, AppState, CurationConfig};

const ENV_BIND_ADDR: &str = "CURATION_BIND_ADDR";
const ENV_HISTORY_PATH: &str = "CURATION_HISTORY_PATH";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = CurationConfig::load().context("loading curation config")?;
    let metrics = Metrics::init(config.oracle.cache_ttl_secs)?;

    let store: DynStore = match std::env::var(ENV_HISTORY_PATH) {
        Ok(path) if !path.trim().is_empty() => {
            info!(path = %path, "selection history on disk");
            Arc::new(JsonFileStore::new(path))
        }
        _ => Arc::new(MemoryStore::default()),
    };
    let oracle = build_oracle(&config.oracle);
    let state = AppState::new(config, oracle, store);

    let app = create_router(state).merge(metrics.router());

    let addr: SocketAddr = std::env::var(ENV_BIND_ADDR)
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()
        .with_context(|| format!("parsing {ENV_BIND_ADDR}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "digest curator listening");
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
