// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /curate (explicit recent list, store-backed recent list, empty pool, bad body,
//   multi-batch shortlist, null article fields)

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use digest_curator::oracle::{DisabledOracle, FixedOracle};
use digest_curator::store::{MemoryStore, SelectionStore};
use digest_curator::{create_router, AppState, CurationConfig};

const BODY_LIMIT: usize = 1024 * 1024;

fn router_with(store: Arc<MemoryStore>) -> Router {
    let state = AppState::new(CurationConfig::default(), Arc::new(DisabledOracle), store);
    create_router(state)
}

async fn post_curate(app: Router, payload: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/curate")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /curate");
    let resp = app.oneshot(req).await.expect("oneshot /curate");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, v)
}

fn articles() -> Value {
    json!([
        {"title": "AI Breakthrough", "source_type": "rss", "url": "http://x.com/a?utm=1", "relevance_score": 85},
        {"title": "AI Breakthrough", "source_type": "feed", "url": "http://x.com/a", "relevance_score": 85},
        {"title": "Totally Unrelated Story", "source_type": "twitter", "url": "http://y.com/b"}
    ])
}

#[tokio::test]
async fn health_returns_ok() {
    let app = router_with(Arc::new(MemoryStore::default()));
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "ok");
}

#[tokio::test]
async fn curate_returns_result_and_records_selection() {
    let store = Arc::new(MemoryStore::default());
    let (status, v) = post_curate(router_with(store.clone()), json!({ "articles": articles() })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mode"], "degraded");
    assert_eq!(v["stage_counts"]["input"], 3);
    assert_eq!(v["stage_counts"]["after_dedup"], 2);
    assert_eq!(v["stage_counts"]["final"], 2);
    assert_eq!(v["selected"].as_array().map(Vec::len), Some(2));
    assert_eq!(v["key_insights"][0], "Fallback mode - manual review needed");

    let recorded = store.recently_selected(7).await.unwrap();
    assert!(recorded.contains("http://x.com/a?utm=1"));
    assert!(recorded.contains("http://y.com/b"));
}

#[tokio::test]
async fn store_history_excludes_recent_urls_when_list_absent() {
    let store = Arc::new(MemoryStore::default());
    store
        .record_selection(&["https://x.com/a".to_string()], Utc::now())
        .await
        .unwrap();

    let (_, v) = post_curate(router_with(store.clone()), json!({ "articles": articles() })).await;
    assert_eq!(v["stage_counts"]["after_diversity"], 1);
    assert_eq!(v["selected"][0]["url"], "http://y.com/b");

    // Explicit empty list overrides the store.
    let (_, v) = post_curate(
        router_with(Arc::new(MemoryStore::default())),
        json!({ "articles": articles(), "recently_selected": [] }),
    )
    .await;
    assert_eq!(v["stage_counts"]["after_diversity"], 2);
}

#[tokio::test]
async fn empty_pool_is_a_normal_response() {
    let (status, v) = post_curate(
        router_with(Arc::new(MemoryStore::default())),
        json!({ "articles": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mode"], "empty");
    assert_eq!(v["selected"], json!([]));
}

#[tokio::test]
async fn curated_mode_with_working_oracle() {
    let oracle = FixedOracle::new(
        r#"{"selected_indices":[1]}"#,
        r#"{"selected_indices":[0],"daily_summary":"s","key_insights":[]}"#,
    );
    let state = AppState::new(
        CurationConfig::default(),
        Arc::new(oracle),
        Arc::new(MemoryStore::default()),
    );
    let (_, v) = post_curate(create_router(state), json!({ "articles": articles() })).await;
    assert_eq!(v["mode"], "curated");
    assert_eq!(v["selected"][0]["title"], "Totally Unrelated Story");
    assert_eq!(v["selected"][0]["source_type"], "social");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (status, _) = post_curate(
        router_with(Arc::new(MemoryStore::default())),
        json!({ "articles": [{"url": "missing title and type"}] }),
    )
    .await;
    assert!(status.is_client_error(), "got {status}");
}

#[tokio::test]
async fn multi_batch_shortlist_runs_inside_the_handler() {
    let mut config = CurationConfig::default();
    config.shortlist.batch_size = 2;
    config.shortlist.concurrency = 2;
    let state = AppState::new(config, Arc::new(DisabledOracle), Arc::new(MemoryStore::default()));

    let titles = [
        "Chip export rules tighten",
        "Rust compiler ships faster builds",
        "Satellite broadband expands coverage",
        "Battery maker raises new funding",
        "Hospital network adopts scheduling software",
    ];
    let pool: Vec<Value> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| json!({"title": t, "source_type": "feed", "url": format!("https://n.com/{i}")}))
        .collect();

    let (status, v) = post_curate(create_router(state), json!({ "articles": pool })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["stage_counts"]["shortlist"], 5);
    // Three shortlist batches plus the final stage, all on fallback.
    assert_eq!(v["degraded_batches"], 4);
    let got: Vec<&str> = v["selected"]
        .as_array()
        .expect("selected array")
        .iter()
        .filter_map(|a| a["title"].as_str())
        .collect();
    assert_eq!(got, titles.to_vec());
}

#[tokio::test]
async fn null_article_fields_do_not_reject_the_pool() {
    let (status, v) = post_curate(
        router_with(Arc::new(MemoryStore::default())),
        json!({ "articles": [
            {"title": "x", "source_type": "feed", "content_excerpt": null, "relevance_score": null},
            {"title": "Another story entirely", "source_type": "rss", "url": null, "tags": null,
             "source_name": null, "published_at": "not a date"}
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {v}");
    assert_eq!(v["stage_counts"]["input"], 2);
    assert_eq!(v["selected"][0]["relevance_score"], 50.0);
}
