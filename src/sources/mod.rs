//! Discovery source adapters
//!
//! A discovery source is one independent origin of host listings. The
//! engine bounds every fetch with a timeout and absorbs every failure
//! into that source's stats slot; adapters only need to fetch.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::HostRecord;

mod http;
mod peer;

pub use http::HttpRegistrySource;
pub use peer::{PeerStore, PeerStoreSource};

/// Standard source name for the local peer network feed
pub const LOCAL_PEER_SOURCE: &str = "local-peer";
/// Standard source name for the global peer network feed
pub const GLOBAL_PEER_SOURCE: &str = "global-peer";
/// Standard source name for the HTTP registry feed
pub const HTTP_REGISTRY_SOURCE: &str = "http-registry";

/// Error types for source fetches
///
/// These never cross the engine boundary; the engine turns them into
/// per-source failure stats and zero hosts.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level fetch failure
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Response arrived but could not be decoded into host records
    #[error("bad response: {0}")]
    BadResponse(String),
}

/// One origin of host listings
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Stable name used for stats, priority ordering, and record tagging
    fn name(&self) -> &str;

    /// Fetch the current host list from this origin
    async fn fetch(&self) -> Result<Vec<HostRecord>, SourceError>;
}
