use async_trait::async_trait;
use berth_core::{AgentConfig, ServerConfig, ServerIdentity};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::traits::{ControlPlane, ControlPlaneConnector, StatusReporter};
use crate::types::{AccessTokenRequest, AccessTokenResponse, InstanceStatusRequest, SecurityToken};

/// Upper bound on any single control plane request, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client whose requests give up after `timeout`.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Authenticated HTTP client for the control plane API.
pub struct ApiClient {
    base_url: String,
    stack_id: String,
    access_token: String,
    credentials_path: PathBuf,
    client: Client,
}

impl ApiClient {
    /// Exchange the configured client credentials for an access token.
    pub async fn connect(config: &AgentConfig) -> Result<Self> {
        Self::connect_with_client(config, http_client(REQUEST_TIMEOUT)).await
    }

    pub async fn connect_with_client(config: &AgentConfig, client: Client) -> Result<Self> {
        let base_url = config.api_host.trim_end_matches('/').to_string();
        let request =
            AccessTokenRequest::client_credentials(&config.client_id, &config.client_secret);

        let response = client
            .post(format!("{}/v2/access_token", base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Authentication(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token: AccessTokenResponse = Self::handle_response(response).await?;
        if token.access_token.is_empty() {
            return Err(ApiError::Authentication(
                "control plane returned an empty access token".to_string(),
            ));
        }

        info!(api_host = %base_url, stack_id = %config.stack_id, "Authenticated with control plane");

        Ok(Self {
            base_url,
            stack_id: config.stack_id.clone(),
            access_token: token.access_token,
            credentials_path: config.credentials_path.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(response.url().path().to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl StatusReporter for ApiClient {
    async fn send_instance_status(&self, identity: &ServerIdentity, status: &str) -> Result<()> {
        debug!(identity = %identity, status = %status, "Sending instance status");

        let response = self
            .client
            .post(format!("{}/v2/alm/instance/status", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&InstanceStatusRequest {
                instance_id: identity.as_str(),
                status,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ControlPlane for ApiClient {
    async fn get_security_token(&self) -> Result<SecurityToken> {
        let response = self
            .client
            .get(format!("{}/v2/alm/sts", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("stack_id", self.stack_id.as_str())])
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn write_temp_token(&self, token: &SecurityToken) -> Result<()> {
        if let Some(parent) = self.credentials_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Owner-only before any secret reaches the file, even if it already existed
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.credentials_path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
        }
        file.write_all(token.to_credentials_file().as_bytes()).await?;
        file.flush().await?;

        debug!(path = %self.credentials_path.display(), "Temporary token written");
        Ok(())
    }

    async fn get_server_config(&self, name: &str) -> Result<ServerConfig> {
        let response = self
            .client
            .get(format!("{}/v2/alm/serverconfig", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("stack_id", self.stack_id.as_str()), ("flag", name)])
            .send()
            .await?;

        Self::handle_response(response).await
    }
}

/// Connects to the control plane over HTTP.
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_client(http_client(timeout))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPlaneConnector for HttpConnector {
    async fn connect(&self, config: &AgentConfig) -> Result<Arc<dyn ControlPlane>> {
        let client = ApiClient::connect_with_client(config, self.client.clone()).await?;
        Ok(Arc::new(client))
    }
}
