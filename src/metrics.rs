use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric descriptions (so series show up on /metrics with help text).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("curation_runs_total", "Curation runs, labelled by mode.");
        describe_counter!(
            "curation_degraded_batches_total",
            "Oracle batches that used the fallback pick, labelled by stage."
        );
        describe_counter!(
            "dedup_removed_total",
            "Articles removed by deduplication, labelled by step."
        );
        describe_counter!(
            "diversity_removed_total",
            "Articles removed by the diversity filter, labelled by reason."
        );
        describe_gauge!(
            "curation_stage_count",
            "Pool size after each stage of the last run."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Article source fetch/parse errors."
        );
        describe_gauge!(
            "oracle_cache_ttl_secs",
            "TTL of the oracle reply cache in seconds."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose a static gauge for the cache TTL.
    pub fn init(cache_ttl_secs: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;

        describe_metrics();
        gauge!("oracle_cache_ttl_secs").set(cache_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// `GET /metrics`: renders every curation, dedup and ingest series recorded so far.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let snapshot = handle.render();
                async move { snapshot }
            }),
        )
    }
}
