use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::article::Article;
use crate::config::CurationConfig;
use crate::curate::{CurationOrchestrator, CurationResult};
use crate::oracle::{build_oracle, DynOracle};
use crate::store::{DynStore, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    config: Arc<CurationConfig>,
    orchestrator: Arc<CurationOrchestrator>,
    oracle: DynOracle,
    store: DynStore,
}

impl AppState {
    pub fn new(config: CurationConfig, oracle: DynOracle, store: DynStore) -> Self {
        let orchestrator = CurationOrchestrator::new(&config);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            oracle,
            store,
        }
    }

    /// Oracle built from config, in-memory selection history.
    pub fn from_config(config: CurationConfig) -> Self {
        let oracle = build_oracle(&config.oracle);
        Self::new(config, oracle, Arc::new(MemoryStore::default()))
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/curate", post(curate))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CurateRequest {
    pub articles: Vec<Article>,
    /// When absent, the selection store is asked for the lookback window.
    #[serde(default)]
    pub recently_selected: Option<Vec<String>>,
}

async fn curate(
    State(state): State<AppState>,
    Json(req): Json<CurateRequest>,
) -> Json<CurationResult> {
    let recent: HashSet<String> = match req.recently_selected {
        Some(urls) => urls.into_iter().collect(),
        None => {
            let days = state.config.diversity.lookback_days;
            state.store.recently_selected(days).await.unwrap_or_else(|e| {
                warn!(error = ?e, "selection history unavailable; no recent exclusions");
                HashSet::new()
            })
        }
    };

    let result = state
        .orchestrator
        .run(req.articles, &recent, state.oracle.as_ref())
        .await;

    let urls = result.selected_urls();
    if !urls.is_empty() {
        if let Err(e) = state.store.record_selection(&urls, result.generated_at).await {
            warn!(error = ?e, "failed to record selection");
        }
    }

    Json(result)
}
