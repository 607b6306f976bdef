//! Unified discovery engine
//!
//! Fans out to all enabled sources concurrently, merges and deduplicates
//! their results by host address, applies the blacklist, caches the
//! merged round with a TTL, and records per-source health stats.
//!
//! Failure isolation is the critical property: every source fetch settles
//! on its own (success, error, or timeout), and no source's outcome can
//! block or cancel another's. All sources failing is a normal "no hosts"
//! outcome, never an engine error.

use async_trait::async_trait;
use futures::future;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::DiscoveryConfig;
use crate::provider::HostInfoProvider;
use crate::reputation::ReputationLedger;
use crate::sources::DiscoverySource;
use crate::types::{DiscoveryOptions, HostRecord};

mod cache;
mod stats;

pub use cache::{DiscoveryCache, UNIFIED_CACHE_KEY};
pub use stats::{DiscoveryStats, SourceStats, StatsRecorder};

/// A registered source with its runtime enable flag
struct SourceSlot {
    source: Arc<dyn DiscoverySource>,
    enabled: bool,
}

/// Multi-source host discovery with merge, caching, and health stats
///
/// The registration order of sources is their priority order: on merge
/// conflicts with equal or absent record timestamps, the earlier source
/// wins. `set_discovery_priority` reorders at runtime.
pub struct DiscoveryEngine {
    sources: RwLock<Vec<SourceSlot>>,
    cache: DiscoveryCache,
    cache_ttl: Mutex<Duration>,
    source_timeout: Duration,
    ledger: Arc<ReputationLedger>,
    stats: StatsRecorder,
    clock: Arc<dyn Clock>,
}

impl DiscoveryEngine {
    /// Create an engine with an owned cache and an injected ledger
    pub fn new(config: DiscoveryConfig, ledger: Arc<ReputationLedger>) -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            cache: DiscoveryCache::new(),
            cache_ttl: Mutex::new(config.cache_ttl),
            source_timeout: config.source_timeout,
            ledger,
            stats: StatsRecorder::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock (for deterministic TTL tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a source at the end of the priority order, enabled
    pub async fn register_source(&self, source: Arc<dyn DiscoverySource>) {
        info!(source = %source.name(), "Registered discovery source");
        let mut sources = self.sources.write().await;
        sources.push(SourceSlot {
            source,
            enabled: true,
        });
    }

    /// Enable or disable a source by name; returns false if unknown
    pub async fn enable_discovery_source(&self, name: &str, enabled: bool) -> bool {
        let mut sources = self.sources.write().await;
        match sources.iter_mut().find(|s| s.source.name() == name) {
            Some(slot) => {
                slot.enabled = enabled;
                info!(source = %name, enabled, "Discovery source toggled");
                true
            }
            None => {
                warn!(source = %name, "Cannot toggle unknown discovery source");
                false
            }
        }
    }

    /// Set merge precedence among sources
    ///
    /// Names appear in winning-first order; sources not mentioned keep
    /// their relative order after the mentioned ones. Unknown names are
    /// logged and ignored.
    pub async fn set_discovery_priority(&self, order: &[&str]) {
        let mut sources = self.sources.write().await;
        let mut remaining = std::mem::take(&mut *sources);
        let mut reordered = Vec::with_capacity(remaining.len());

        for name in order {
            match remaining.iter().position(|s| s.source.name() == *name) {
                Some(pos) => reordered.push(remaining.remove(pos)),
                None => warn!(source = %name, "Unknown source in priority order, ignoring"),
            }
        }
        reordered.append(&mut remaining);
        *sources = reordered;

        info!(?order, "Discovery priority updated");
    }

    /// Change the cache TTL for subsequent rounds
    pub fn set_cache_ttl(&self, ttl: Duration) {
        let mut current = self.cache_ttl.lock().unwrap_or_else(|e| e.into_inner());
        *current = ttl;
        info!(ttl_ms = ttl.as_millis() as u64, "Discovery cache TTL updated");
    }

    /// Snapshot of discovery counters and per-source health
    pub fn get_discovery_stats(&self) -> DiscoveryStats {
        self.stats.snapshot()
    }

    /// Discover hosts across all enabled sources
    ///
    /// Serves the merged round from cache when fresh (unless
    /// `force_refresh`), then applies the caller's post-filters. Inactive
    /// hosts are always dropped here. Zero enabled sources or all sources
    /// failing yields an empty list, not an error.
    pub async fn discover_all_hosts(&self, options: &DiscoveryOptions) -> Vec<HostRecord> {
        let merged = self.merged_hosts(options).await;
        apply_post_filters(merged, options)
    }

    /// The merged round, blacklist-filtered at serve time, before
    /// post-filters
    ///
    /// Keeps inactive records so `get_host_info` can distinguish an
    /// inactive host from an unknown one.
    async fn merged_hosts(&self, options: &DiscoveryOptions) -> Vec<HostRecord> {
        let ttl = options.ttl_override.unwrap_or_else(|| self.current_ttl());

        if !options.force_refresh {
            if let Some(hosts) = self.cache.get(UNIFIED_CACHE_KEY, self.clock.now(), ttl) {
                self.stats.record_cache_hit();
                debug!(count = hosts.len(), "Serving discovery round from cache");
                // Re-check the blacklist so an exclusion landing mid-TTL
                // takes effect without waiting out the cache entry.
                return self.filter_blacklisted(hosts);
            }
        }

        self.stats.record_cache_miss();
        self.stats.record_discovery();

        let slots: Vec<(String, Arc<dyn DiscoverySource>)> = {
            let sources = self.sources.read().await;
            sources
                .iter()
                .filter(|s| s.enabled)
                .map(|s| (s.source.name().to_string(), s.source.clone()))
                .collect()
        };

        if slots.is_empty() {
            debug!("No enabled discovery sources");
            return Vec::new();
        }

        let timeout = self.source_timeout;
        let fetches = slots.into_iter().map(|(name, source)| async move {
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, source.fetch()).await;
            (name, started.elapsed(), outcome)
        });

        // Every fetch settles independently; one source timing out or
        // erroring never cancels the others.
        let settled = future::join_all(fetches).await;

        let mut merged: HashMap<String, HostRecord> = HashMap::new();
        let mut arrival_order: Vec<String> = Vec::new();

        for (name, elapsed, outcome) in settled {
            let hosts = match outcome {
                Ok(Ok(hosts)) => {
                    self.stats.record_source_success(&name, elapsed);
                    hosts
                }
                Ok(Err(e)) => {
                    warn!(source = %name, error = %e, "Discovery source failed");
                    self.stats.record_source_failure(&name);
                    continue;
                }
                Err(_) => {
                    warn!(source = %name, timeout_ms = timeout.as_millis() as u64, "Discovery source timed out");
                    self.stats.record_source_failure(&name);
                    continue;
                }
            };

            for mut host in hosts {
                host.source = name.clone();
                let key = host.address_key();
                match merged.get(&key) {
                    None => {
                        arrival_order.push(key.clone());
                        merged.insert(key, host);
                    }
                    Some(existing) => {
                        // Newest record wins; a timestamped record beats
                        // an untimestamped one; ties keep the earlier
                        // (higher-priority) source's record.
                        let newer = match (host.updated_at, existing.updated_at) {
                            (Some(incoming), Some(held)) => incoming > held,
                            (Some(_), None) => true,
                            (None, _) => false,
                        };
                        if newer {
                            merged.insert(key, host);
                        }
                    }
                }
            }
        }

        // Sources were processed in priority order, so first-seen order
        // is already the stable priority sort.
        let hosts: Vec<HostRecord> = arrival_order
            .iter()
            .filter_map(|key| merged.remove(key))
            .collect();

        debug!(count = hosts.len(), "Merged discovery round");

        // The cached round is pre-blacklist: exclusions are applied on
        // every serve, so both a fresh blacklisting and a lapsed one take
        // effect inside an existing entry's TTL.
        self.cache
            .put(UNIFIED_CACHE_KEY, hosts.clone(), self.clock.now());

        self.filter_blacklisted(hosts)
    }

    fn filter_blacklisted(&self, mut hosts: Vec<HostRecord>) -> Vec<HostRecord> {
        hosts.retain(|host| {
            let excluded = self.ledger.is_blacklisted(&host.address);
            if excluded {
                debug!(address = %host.address, "Dropping blacklisted host");
            }
            !excluded
        });
        hosts
    }

    fn current_ttl(&self) -> Duration {
        *self.cache_ttl.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HostInfoProvider for DiscoveryEngine {
    async fn get_host_info(&self, address: &str) -> Option<HostRecord> {
        let key = address.to_ascii_lowercase();
        self.merged_hosts(&DiscoveryOptions::default())
            .await
            .into_iter()
            .find(|h| h.address_key() == key)
    }

    async fn find_hosts_for_model(&self, model: &str) -> Vec<HostRecord> {
        self.discover_all_hosts(&DiscoveryOptions::new().with_model(model))
            .await
    }
}

/// Apply the caller's post-filters, AND-combined, each only when present
fn apply_post_filters(mut hosts: Vec<HostRecord>, options: &DiscoveryOptions) -> Vec<HostRecord> {
    hosts.retain(|h| h.is_active);

    if let Some(model) = &options.model {
        hosts.retain(|h| h.supports_model(model));
    }
    if let Some(max_price) = options.max_price {
        hosts.retain(|h| h.min_price_per_token_native <= max_price);
    }
    if let Some(region) = &options.region {
        hosts.retain(|h| h.region.as_deref() == Some(region.as_str()));
    }
    if let Some(min) = options.min_latency_ms {
        hosts.retain(|h| h.latency_ms.is_some_and(|l| l >= min));
    }
    if let Some(max) = options.max_latency_ms {
        hosts.retain(|h| h.latency_ms.is_some_and(|l| l <= max));
    }

    hosts
}
