use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{CoreError, Result};

/// A login account to provision on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub public_key: String,
}

/// Server configuration as returned by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Image of the workload container
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_password: Option<String>,
    #[serde(default)]
    pub env_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Repository URL of the application code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_reference: Option<String>,
    /// Deploy key for a private repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_private_key: Option<String>,
    #[serde(default)]
    pub users: BTreeMap<String, LoginUser>,
    /// Version stamp of this configuration
    #[serde(default)]
    pub updated: i64,
}

impl ServerConfig {
    /// Code reference, if the configuration names one.
    pub fn code_reference(&self) -> Option<&str> {
        self.code.as_deref().filter(|code| !code.trim().is_empty())
    }

    /// Deploy key, if the configuration names one.
    pub fn repository_key(&self) -> Option<&str> {
        self.git_private_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Persists the server configuration once the workload is up.
#[async_trait]
pub trait ServerConfigStore: Send + Sync {
    async fn write_updated(&self, config: &ServerConfig) -> Result<()>;
}

/// Writes the server configuration as pretty JSON to a fixed path.
#[derive(Debug, Clone)]
pub struct FileServerConfigStore {
    path: PathBuf,
}

impl FileServerConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back a previously persisted configuration, if any.
    pub async fn read(&self) -> Result<Option<ServerConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|source| CoreError::Persist {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[async_trait]
impl ServerConfigStore for FileServerConfigStore {
    async fn write_updated(&self, config: &ServerConfig) -> Result<()> {
        let persist_err = |source| CoreError::Persist {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content).await.map_err(persist_err)?;
        debug!(path = %self.path.display(), updated = config.updated, "Server config persisted");

        Ok(())
    }
}
