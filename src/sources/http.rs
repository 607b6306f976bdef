//! HTTP registry discovery source
//!
//! Fetches a JSON array of host records from a registry endpoint.
//! Wire format: camelCase `HostRecord` objects; stake as a decimal string
//! or plain number.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::{DiscoverySource, SourceError, HTTP_REGISTRY_SOURCE};
use crate::types::HostRecord;

/// Discovery source backed by an HTTP registry endpoint
pub struct HttpRegistrySource {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRegistrySource {
    /// Create a source for the given endpoint with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self::with_name(HTTP_REGISTRY_SOURCE, endpoint, timeout)
    }

    /// Create a source with a custom name (for multiple registries)
    pub fn with_name(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl DiscoverySource for HttpRegistrySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<HostRecord>, SourceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| SourceError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::Fetch(e.to_string()))?;

        let mut hosts: Vec<HostRecord> = response
            .json()
            .await
            .map_err(|e| SourceError::BadResponse(e.to_string()))?;

        // Registries that omit freshness get stamped on arrival so the
        // merge can still compare records against other sources.
        let now = Utc::now();
        for host in &mut hosts {
            host.source = self.name.clone();
            if host.updated_at.is_none() {
                host.updated_at = Some(now);
            }
        }

        debug!(
            source = %self.name,
            count = hosts.len(),
            "Fetched hosts from registry"
        );

        Ok(hosts)
    }
}
