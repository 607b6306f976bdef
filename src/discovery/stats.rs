//! Discovery statistics
//!
//! Process-lifetime counters for discovery rounds and per-source health.
//! Reset only on restart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Health counters for one discovery source
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Running mean fetch duration over successful fetches only
    pub average_time_ms: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

/// Snapshot of discovery activity since process start
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStats {
    pub total_discoveries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub sources: HashMap<String, SourceStats>,
}

/// Mutex-guarded recorder the engine increments during rounds
pub struct StatsRecorder {
    inner: Mutex<DiscoveryStats>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DiscoveryStats::default()),
        }
    }

    pub fn record_cache_hit(&self) {
        let mut stats = self.lock();
        stats.cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        let mut stats = self.lock();
        stats.cache_misses += 1;
    }

    pub fn record_discovery(&self) {
        let mut stats = self.lock();
        stats.total_discoveries += 1;
    }

    /// Record one successful fetch and fold its duration into the mean
    pub fn record_source_success(&self, source: &str, elapsed: Duration) {
        let mut stats = self.lock();
        let entry = stats.sources.entry(source.to_string()).or_default();
        entry.attempts += 1;
        entry.successes += 1;
        entry.last_success = Some(Utc::now());

        let ms = elapsed.as_secs_f64() * 1000.0;
        entry.average_time_ms += (ms - entry.average_time_ms) / entry.successes as f64;
    }

    /// Record one failed or timed-out fetch; the mean is left untouched
    pub fn record_source_failure(&self, source: &str) {
        let mut stats = self.lock();
        let entry = stats.sources.entry(source.to_string()).or_default();
        entry.attempts += 1;
        entry.failures += 1;
        entry.last_failure = Some(Utc::now());
    }

    pub fn snapshot(&self) -> DiscoveryStats {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DiscoveryStats> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
