// tests/store_file.rs

use chrono::{Duration, Utc};
use std::sync::Arc;

use digest_curator::store::{JsonFileStore, SelectionStore};

#[tokio::test]
async fn json_store_round_trips_and_windows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.json");
    let store = JsonFileStore::new(&path);

    assert!(store.recently_selected(7).await.unwrap().is_empty());

    let now = Utc::now();
    store
        .record_selection(&["https://old.example/1".to_string()], now - Duration::days(30))
        .await
        .unwrap();
    store
        .record_selection(
            &["https://new.example/1".to_string(), "  ".to_string()],
            now,
        )
        .await
        .unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());

    // A fresh handle sees what the first one wrote.
    let reopened = JsonFileStore::new(&path);
    let recent = reopened.recently_selected(7).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(recent.contains("https://new.example/1"));
    assert_eq!(reopened.load().await.unwrap().len(), 2);
    assert_eq!(reopened.recently_selected(60).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_records_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("history.json")));

    let mut handles = Vec::new();
    for i in 0..8 {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.record_selection(&[format!("https://c.example/{i}")], Utc::now())
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(store.recently_selected(1).await.unwrap().len(), 8);
}

#[tokio::test]
async fn corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, "{ not an array").unwrap();
    assert!(JsonFileStore::new(&path).recently_selected(7).await.is_err());
}
