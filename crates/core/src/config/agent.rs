use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::error::{CoreError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/berth/berth.toml";
const DEFAULT_LOG_IMAGE: &str = "berth/log-forwarder:latest";
const DEFAULT_INTERVAL_SECS: u64 = 2;
const DEFAULT_DEADLINE_SECS: u64 = 180;

/// Agent configuration stored on the host as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the control plane API
    pub api_host: String,
    /// Client credentials used to obtain an access token
    pub client_id: String,
    pub client_secret: String,
    /// Stack this host belongs to
    pub stack_id: String,
    #[serde(default = "default_log_image")]
    pub log_image: String,
    #[serde(default)]
    pub log_region: Option<String>,
    /// Where the temporary security token is written
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Where the fetched server configuration is persisted
    #[serde(default = "default_server_config_path")]
    pub server_config_path: PathBuf,
    /// File the workload writes its state label into
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Checkout target for application code
    #[serde(default = "default_code_dir")]
    pub code_dir: PathBuf,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Cadence of the container state poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            deadline_secs: DEFAULT_DEADLINE_SECS,
        }
    }
}

fn default_log_image() -> String {
    DEFAULT_LOG_IMAGE.to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("/root/.aws/credentials")
}

fn default_server_config_path() -> PathBuf {
    PathBuf::from("/var/lib/berth/server_config.json")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/berth/container_state")
}

fn default_code_dir() -> PathBuf {
    PathBuf::from("/var/lib/berth/code")
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

impl AgentConfig {
    /// Parse a config document.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the config file at `path`.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| CoreError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&content, path)?;
        debug!(path = %path.display(), api_host = %config.api_host, "Agent config loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_host.trim().is_empty() {
            return Err(CoreError::Validation("api_host must be set".to_string()));
        }
        if self.polling.interval_secs == 0 {
            return Err(CoreError::Validation(
                "polling.interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source of the agent configuration.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<AgentConfig>;
}

/// Loads the agent configuration from a TOML file on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileConfigLoader;

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load(&self, path: &Path) -> Result<AgentConfig> {
        AgentConfig::load_from_file(path).await
    }
}
