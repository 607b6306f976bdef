//! Peer network discovery source
//!
//! In-memory announce/withdraw table fed by the embedding P2P layer.
//! The transport (peer dialing, gossip) is not this crate's concern; it
//! only sees the resulting host announcements.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{DiscoverySource, SourceError, GLOBAL_PEER_SOURCE, LOCAL_PEER_SOURCE};
use crate::types::HostRecord;

/// Concurrent table of host announcements from one peer network
pub struct PeerStore {
    name: String,
    peers: DashMap<String, HostRecord>,
}

impl PeerStore {
    /// Create a store for the given peer network name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peers: DashMap::new(),
        }
    }

    /// Store for the local peer network feed
    pub fn local_peers() -> Self {
        Self::new(LOCAL_PEER_SOURCE)
    }

    /// Store for the global peer network feed
    pub fn global_peers() -> Self {
        Self::new(GLOBAL_PEER_SOURCE)
    }

    /// Name of the peer network this store feeds
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record or refresh a host announcement
    pub fn announce(&self, mut host: HostRecord) {
        host.source = self.name.clone();
        if host.updated_at.is_none() {
            host.updated_at = Some(Utc::now());
        }
        let key = host.address_key();
        debug!(source = %self.name, address = %host.address, "Peer announced");
        self.peers.insert(key, host);
    }

    /// Remove a host announcement
    pub fn withdraw(&self, address: &str) -> bool {
        let removed = self.peers.remove(&address.to_ascii_lowercase()).is_some();
        if removed {
            debug!(source = %self.name, address = %address, "Peer withdrawn");
        }
        removed
    }

    /// Current announcements
    pub fn snapshot(&self) -> Vec<HostRecord> {
        self.peers.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of announced peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are announced
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Discovery source view over a shared `PeerStore`
///
/// The embedding layer keeps the `Arc<PeerStore>` to feed announcements;
/// the discovery engine owns this adapter.
pub struct PeerStoreSource {
    store: Arc<PeerStore>,
}

impl PeerStoreSource {
    pub fn new(store: Arc<PeerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DiscoverySource for PeerStoreSource {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn fetch(&self) -> Result<Vec<HostRecord>, SourceError> {
        Ok(self.store.snapshot())
    }
}
