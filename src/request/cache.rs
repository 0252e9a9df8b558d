use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Arc<[u8]>,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

// Expired entries are only removed when they are looked up again.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Arc<[u8]>> {
        let valid = self.entries.get(key)?.is_valid_at(now);
        if valid {
            self.entries.get(key).map(|entry| Arc::clone(&entry.payload))
        } else {
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&mut self, key: String, payload: Arc<[u8]>, ttl: Duration, now: Instant) {
        if ttl.is_zero() {
            self.entries.remove(&key);
            return;
        }
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            expires_at: now + ttl,
        };
        self.entries.insert(key, entry);
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
