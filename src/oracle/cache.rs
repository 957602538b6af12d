// src/oracle/cache.rs
//! Reply cache owned by an oracle adapter: explicit TTL, explicit invalidation.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Entries expire `ttl` after insertion (absolute, no sliding refresh).
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(key) {
            Some((at, value)) if at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: String) {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, (at, _)| at.elapsed() < self.ttl);
        map.insert(key, (Instant::now(), value));
    }

    /// Returns whether an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for one model + prompt pair (hex SHA-256).
pub fn prompt_key(model: &str, prompt: &str) -> String {
    let mut h = Sha256::new();
    h.update(model.as_bytes());
    h.update([0u8]);
    h.update(prompt.as_bytes());
    h.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_invalidate() {
        let c = TtlCache::new(Duration::from_secs(60));
        c.insert("k".into(), "v".into());
        assert_eq!(c.get("k").as_deref(), Some("v"));
        assert!(c.invalidate("k"));
        assert!(c.get("k").is_none());
        assert!(!c.invalidate("k"));
    }

    #[test]
    fn zero_ttl_never_hits() {
        let c = TtlCache::new(Duration::ZERO);
        c.insert("k".into(), "v".into());
        assert!(c.get("k").is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let c = TtlCache::new(Duration::from_secs(60));
        c.insert("a".into(), "1".into());
        c.insert("b".into(), "2".into());
        assert_eq!(c.len(), 2);
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn prompt_key_depends_on_model() {
        assert_ne!(prompt_key("m1", "p"), prompt_key("m2", "p"));
        assert_eq!(prompt_key("m1", "p"), prompt_key("m1", "p"));
        assert_eq!(prompt_key("m", "p").len(), 64);
    }
}
