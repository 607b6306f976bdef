//! Host info provider seam
//!
//! The selection engine never talks to sources directly; it consults a
//! `HostInfoProvider` for the current host population. The discovery
//! engine implements this trait, but callers may also plug in an on-chain
//! registry query or a fixed host set for tests.

use async_trait::async_trait;

use crate::types::HostRecord;

/// Authoritative view of the host fleet, as the selection engine needs it
#[async_trait]
pub trait HostInfoProvider: Send + Sync {
    /// Look up a single host by address (case-insensitive).
    ///
    /// Inactive hosts are still returned here so callers can distinguish
    /// "inactive" from "unknown".
    async fn get_host_info(&self, address: &str) -> Option<HostRecord>;

    /// All active hosts currently listing the given model
    async fn find_hosts_for_model(&self, model: &str) -> Vec<HostRecord>;

    /// Whether the given host lists the given model
    async fn host_supports_model(&self, address: &str, model: &str) -> bool {
        match self.get_host_info(address).await {
            Some(host) => host.supports_model(model),
            None => false,
        }
    }
}
