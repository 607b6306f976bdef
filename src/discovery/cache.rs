//! Discovery result cache
//!
//! Keyed in-memory store of merged discovery rounds. TTL expiry is lazy:
//! an expired entry is removed on lookup, never served, never extended.
//! The engine passes "now" in so tests can drive time explicitly.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::HostRecord;

/// Cache key for the unified (all-sources) merge
pub const UNIFIED_CACHE_KEY: &str = "unified";

#[derive(Debug, Clone)]
struct CacheEntry {
    hosts: Vec<HostRecord>,
    stored_at: Instant,
}

/// Keyed TTL cache of discovery rounds
pub struct DiscoveryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Serve a live entry, pruning it instead if it has outlived `ttl`
    pub fn get(&self, key: &str, now: Instant, ttl: Duration) -> Option<Vec<HostRecord>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let live = match entries.get(key) {
            Some(entry) => now.duration_since(entry.stored_at) < ttl,
            None => return None,
        };

        if !live {
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|e| e.hosts.clone())
    }

    /// Store a discovery round under `key`, stamped at `now`
    pub fn put(&self, key: &str, hosts: Vec<HostRecord>, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            CacheEntry {
                hosts,
                stored_at: now,
            },
        );
    }

    /// Drop all entries
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new()
    }
}
