use async_trait::async_trait;
use berth_core::{AgentConfig, ServerConfig, ServerIdentity};
use std::sync::Arc;

use crate::error::Result;
use crate::types::SecurityToken;

/// Sends instance status labels to the control plane.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn send_instance_status(&self, identity: &ServerIdentity, status: &str) -> Result<()>;
}

/// An authenticated control plane session.
#[async_trait]
pub trait ControlPlane: StatusReporter {
    async fn get_security_token(&self) -> Result<SecurityToken>;

    /// Store the temporary token where the workload's tooling picks it up.
    async fn write_temp_token(&self, token: &SecurityToken) -> Result<()>;

    async fn get_server_config(&self, name: &str) -> Result<ServerConfig>;
}

/// Authenticates against the control plane.
#[async_trait]
pub trait ControlPlaneConnector: Send + Sync {
    async fn connect(&self, config: &AgentConfig) -> Result<Arc<dyn ControlPlane>>;
}
