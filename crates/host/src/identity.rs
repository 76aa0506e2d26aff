use async_trait::async_trait;
use berth_core::ServerIdentity;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{HostError, Result};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves this host's identity from a named provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, provider: &str) -> Result<ServerIdentity>;
}

/// Reads the instance id from the cloud provider's metadata service.
pub struct MetadataIdentity {
    client: Client,
    endpoints: HashMap<String, String>,
}

impl MetadataIdentity {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .unwrap_or_default();

        let mut endpoints = HashMap::new();
        endpoints.insert(
            "aws".to_string(),
            "http://169.254.169.254/latest/meta-data/instance-id".to_string(),
        );
        endpoints.insert(
            "alicloud".to_string(),
            "http://100.100.100.200/latest/meta-data/instance-id".to_string(),
        );

        Self { client, endpoints }
    }

    /// Register or override the metadata URL for `provider`.
    pub fn with_endpoint(mut self, provider: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(provider.into(), url.into());
        self
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for MetadataIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MetadataIdentity {
    async fn resolve(&self, provider: &str) -> Result<ServerIdentity> {
        let url = self
            .endpoints
            .get(provider)
            .ok_or_else(|| HostError::UnknownProvider(provider.to_string()))?;

        debug!(provider = %provider, url = %url, "Querying instance metadata");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(HostError::InvalidResponse(format!(
                "Status {} from {}",
                response.status(),
                url
            )));
        }

        let body = response.text().await?;
        let identity = ServerIdentity::parse(&body)
            .map_err(|e| HostError::InvalidResponse(e.to_string()))?;

        info!(provider = %provider, identity = %identity, "Server identity resolved");
        Ok(identity)
    }
}
