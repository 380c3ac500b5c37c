//! Freshness cache (C3).
//!
//! A short-TTL in-memory mapping with absolute expiry, generalised from
//! the per-category `ContextCache` pattern used elsewhere in this engine's
//! enrichment pipeline. Non-blocking: reads and writes take a short-held
//! `tokio::sync::RwLock`, never an upstream or store call.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default TTL for a single coin's cache entry (spec §4.3, not configurable).
pub const COIN_CACHE_EXPIRY: Duration = Duration::from_secs(120);

/// Short TTL used when returning data known to be stale because upstream
/// is unavailable (spec §4.3, not configurable).
pub const STALE_CACHE_TTL: Duration = Duration::from_secs(30);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A non-blocking, TTL-expiring cache keyed by string fingerprint.
///
/// Values are cloned out on `get` and cloned in on `set`: the cache never
/// shares mutable state with callers, satisfying spec §4.3's "values are
/// copies" contract without requiring `V: Copy`.
pub struct FreshnessCache<V: Clone + Send + Sync> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone + Send + Sync> Default for FreshnessCache<V> {
    fn default() -> Self {
        FreshnessCache {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone + Send + Sync> FreshnessCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respects expiry: an expired entry is treated as absent.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|e| {
            if Instant::now() < e.expires_at {
                Some(e.value.clone())
            } else {
                None
            }
        })
    }

    /// Stores with absolute expiry = now + ttl.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop entries that have expired. Callers may run this periodically;
    /// `get`/`set` are correct without it since expiry is checked lazily.
    pub async fn evict_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
