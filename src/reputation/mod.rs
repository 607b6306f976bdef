//! Reputation and blacklist ledger
//!
//! Tracks per-host trust scores, temporary/permanent exclusions, and a
//! bounded connection-metric history. This is the only state that
//! outlives a single discovery round; it lives in memory for the life of
//! the engine and is never persisted.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};

/// Maximum connection samples kept per host
pub const MAX_CONNECTION_SAMPLES: usize = 100;

/// Trust score seen before any outcome has been reported
const DEFAULT_REPUTATION_SCORE: f64 = 0.5;

/// Running reliability estimate for one host
///
/// Invariant: once any observation exists, `score` equals
/// `successful_requests / (successful_requests + failed_requests)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerReputation {
    /// Trust score in [0, 1]
    pub score: f64,
    pub successful_requests: u64,
    pub failed_requests: u64,
}

impl Default for PeerReputation {
    fn default() -> Self {
        Self {
            score: DEFAULT_REPUTATION_SCORE,
            successful_requests: 0,
            failed_requests: 0,
        }
    }
}

/// One reputation report
///
/// Some callers report outcomes incrementally (request-count deltas);
/// others report a pre-computed score. Both paths are supported; when
/// both appear in one update, the explicit score wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReputationUpdate {
    /// Successful requests to add to the running total
    pub successful_requests: Option<u64>,
    /// Failed requests to add to the running total
    pub failed_requests: Option<u64>,
    /// Explicit score overwrite
    pub score: Option<f64>,
}

impl ReputationUpdate {
    /// Report a number of successful requests
    pub fn successes(n: u64) -> Self {
        Self {
            successful_requests: Some(n),
            ..Self::default()
        }
    }

    /// Report a number of failed requests
    pub fn failures(n: u64) -> Self {
        Self {
            failed_requests: Some(n),
            ..Self::default()
        }
    }

    /// Overwrite the score directly
    pub fn score(score: f64) -> Self {
        Self {
            score: Some(score),
            ..Self::default()
        }
    }
}

/// Blacklist entry with optional expiry
#[derive(Debug, Clone)]
struct BlacklistEntry {
    reason: String,
    /// None means permanent until explicitly cleared
    until: Option<Instant>,
}

/// One connection outcome observation
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSample {
    pub latency: Duration,
}

impl ConnectionSample {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

/// Connection quality bucket derived from average latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    /// Bucket an average latency
    pub fn from_average_latency(avg: Duration) -> Self {
        let ms = avg.as_millis();
        if ms < 100 {
            Self::Excellent
        } else if ms < 300 {
            Self::Good
        } else if ms < 1000 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Aggregated view of a host's connection history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetrics {
    pub sample_count: usize,
    pub average_latency_ms: u64,
    pub quality: ConnectionQuality,
}

/// Per-host trust scores, exclusions, and connection history
pub struct ReputationLedger {
    reputations: DashMap<String, PeerReputation>,
    blacklist: DashMap<String, BlacklistEntry>,
    connections: DashMap<String, VecDeque<ConnectionSample>>,
    clock: Arc<dyn Clock>,
}

impl ReputationLedger {
    /// Create a ledger on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a ledger on an injected clock (for deterministic expiry tests)
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            reputations: DashMap::new(),
            blacklist: DashMap::new(),
            connections: DashMap::new(),
            clock,
        }
    }

    fn key(host: &str) -> String {
        host.to_ascii_lowercase()
    }

    /// Apply a reputation report for a host
    ///
    /// Count deltas recompute the score from the running totals; an
    /// explicit score overwrites whatever the ratio says.
    pub fn update_peer_reputation(&self, host: &str, update: ReputationUpdate) {
        let mut entry = self
            .reputations
            .entry(Self::key(host))
            .or_default();

        if let Some(n) = update.successful_requests {
            entry.successful_requests += n;
        }
        if let Some(n) = update.failed_requests {
            entry.failed_requests += n;
        }

        let total = entry.successful_requests + entry.failed_requests;
        if total > 0 {
            entry.score = entry.successful_requests as f64 / total as f64;
        }

        if let Some(score) = update.score {
            entry.score = score.clamp(0.0, 1.0);
        }

        debug!(
            host = %host,
            score = entry.score,
            successes = entry.successful_requests,
            failures = entry.failed_requests,
            "Updated peer reputation"
        );
    }

    /// Current reputation for a host (default 0.5 if unseen)
    pub fn get_peer_reputation(&self, host: &str) -> PeerReputation {
        self.reputations
            .get(&Self::key(host))
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Exclude a host from discovery results
    ///
    /// `duration` of None means permanent until `clear_blacklist`.
    pub fn blacklist_peer(&self, host: &str, reason: impl Into<String>, duration: Option<Duration>) {
        let reason = reason.into();
        let until = duration.map(|d| self.clock.now() + d);
        info!(host = %host, reason = %reason, permanent = until.is_none(), "Blacklisted peer");
        self.blacklist
            .insert(Self::key(host), BlacklistEntry { reason, until });
    }

    /// Remove a host from the blacklist
    pub fn clear_blacklist(&self, host: &str) -> bool {
        self.blacklist.remove(&Self::key(host)).is_some()
    }

    /// Whether a host is currently excluded
    ///
    /// Expired entries are treated as absent and pruned on this lookup;
    /// there is no background sweep.
    pub fn is_blacklisted(&self, host: &str) -> bool {
        let key = Self::key(host);
        let now = self.clock.now();

        let expired = match self.blacklist.get(&key) {
            Some(entry) => match entry.until {
                Some(until) => until <= now,
                None => return true,
            },
            None => return false,
        };

        if expired {
            self.blacklist.remove(&key);
            debug!(host = %host, "Blacklist entry expired");
            return false;
        }

        true
    }

    /// Reason a host was blacklisted, if it currently is
    pub fn blacklist_reason(&self, host: &str) -> Option<String> {
        if !self.is_blacklisted(host) {
            return None;
        }
        self.blacklist
            .get(&Self::key(host))
            .map(|e| e.reason.clone())
    }

    /// Record one connection observation, keeping the last 100 per host
    pub fn record_connection_metrics(&self, host: &str, sample: ConnectionSample) {
        let mut history = self
            .connections
            .entry(Self::key(host))
            .or_default();

        history.push_back(sample);
        while history.len() > MAX_CONNECTION_SAMPLES {
            history.pop_front();
        }
    }

    /// Aggregated connection history for a host, if any samples exist
    pub fn get_connection_metrics(&self, host: &str) -> Option<ConnectionMetrics> {
        let history = self.connections.get(&Self::key(host))?;
        if history.is_empty() {
            return None;
        }

        let total: Duration = history.iter().map(|s| s.latency).sum();
        let avg = total / history.len() as u32;

        Some(ConnectionMetrics {
            sample_count: history.len(),
            average_latency_ms: avg.as_millis() as u64,
            quality: ConnectionQuality::from_average_latency(avg),
        })
    }
}

impl Default for ReputationLedger {
    fn default() -> Self {
        Self::new()
    }
}
