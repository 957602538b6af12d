// src/store.rs
//! Selection history: which URLs were surfaced recently.
//!
//! The pipeline only reads from it (`recently_selected`); callers record a run's
//! selection afterwards.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Hard ceiling on retained entries for both stores.
pub const MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub url: String,
    pub selected_at: DateTime<Utc>,
}

#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// URLs selected within the trailing `window_days`.
    async fn recently_selected(&self, window_days: u32) -> Result<HashSet<String>>;

    async fn record_selection(&self, urls: &[String], at: DateTime<Utc>) -> Result<()>;
}

pub type DynStore = Arc<dyn SelectionStore>;

/// URLs from entries newer than `now - window_days`.
pub fn urls_within(entries: &[SelectionEntry], window_days: u32, now: DateTime<Utc>) -> HashSet<String> {
    let cutoff = now - Duration::days(i64::from(window_days));
    entries
        .iter()
        .filter(|e| e.selected_at >= cutoff)
        .map(|e| e.url.clone())
        .collect()
}

fn append_capped(entries: &mut Vec<SelectionEntry>, urls: &[String], at: DateTime<Utc>, cap: usize) {
    entries.extend(
        urls.iter()
            .filter(|u| !u.trim().is_empty())
            .map(|u| SelectionEntry {
                url: u.clone(),
                selected_at: at,
            }),
    );
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(0..excess);
    }
}

/// In-process history, oldest entries dropped past `cap`.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Vec<SelectionEntry>>,
    cap: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity(2000)
    }
}

impl MemoryStore {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, MAX_ENTRIES);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(1024))),
            cap,
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<SelectionEntry> {
        let v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }
}

#[async_trait]
impl SelectionStore for MemoryStore {
    async fn recently_selected(&self, window_days: u32) -> Result<HashSet<String>> {
        let v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(urls_within(&v, window_days, Utc::now()))
    }

    async fn record_selection(&self, urls: &[String], at: DateTime<Utc>) -> Result<()> {
        let mut v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        append_capped(&mut v, urls, at, self.cap);
        Ok(())
    }
}

/// JSON array on disk, rewritten atomically (tmp file + rename) on every record.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cap: usize,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cap: MAX_ENTRIES,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means empty history.
    pub async fn load(&self) -> Result<Vec<SelectionEntry>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(Vec::new()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing selection history {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e)
                .with_context(|| format!("reading selection history {}", self.path.display())),
        }
    }

    async fn save(&self, entries: &[SelectionEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl SelectionStore for JsonFileStore {
    async fn recently_selected(&self, window_days: u32) -> Result<HashSet<String>> {
        let entries = self.load().await?;
        Ok(urls_within(&entries, window_days, Utc::now()))
    }

    async fn record_selection(&self, urls: &[String], at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        append_capped(&mut entries, urls, at, self.cap);
        self.save(&entries).await
    }
}
