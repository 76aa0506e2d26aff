use async_trait::async_trait;
use berth_core::{AgentConfig, ServerConfig, ServerIdentity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const CODE_MOUNT: &str = "/var/www/code";
pub const STATE_MOUNT: &str = "/var/run/berth";

/// Which container of the episode this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRole {
    /// Log forwarder, runs in the background
    Log,
    /// The workload itself
    Active,
}

impl ContainerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Active => "active",
        }
    }

    /// Container name used on the host.
    pub fn container_name(&self) -> String {
        format!("berth-{}", self.as_str())
    }
}

/// Everything needed to start one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub role: ContainerRole,
    pub image: String,
    pub env: BTreeMap<String, String>,
    /// Host path mounted at [`CODE_MOUNT`]; no code mount when unset
    pub code_dir: Option<PathBuf>,
    /// Extra bind mounts as (host path, container path)
    pub mounts: Vec<(PathBuf, String)>,
    /// Foreground containers are pulled first and must be running on return
    pub foreground: bool,
    pub registry_auth: Option<(String, String)>,
}

impl ContainerRequest {
    /// The log forwarder, tagged with this host's identity.
    pub fn log(config: &AgentConfig, identity: &ServerIdentity) -> Self {
        let mut env = BTreeMap::new();
        env.insert("BERTH_SERVER_ID".to_string(), identity.to_string());
        env.insert("BERTH_STACK_ID".to_string(), config.stack_id.clone());
        if let Some(region) = &config.log_region {
            env.insert("BERTH_LOG_REGION".to_string(), region.clone());
        }

        Self {
            role: ContainerRole::Log,
            image: config.log_image.clone(),
            env,
            code_dir: None,
            mounts: vec![(PathBuf::from("/var/log"), "/var/log/host".to_string())],
            foreground: false,
            registry_auth: None,
        }
    }

    /// The workload described by the server configuration.
    ///
    /// The directory holding `state_file` is shared with the container so the
    /// workload can write its state label.
    pub fn active(server: &ServerConfig, code_dir: Option<&Path>, state_file: &Path) -> Self {
        let mut env = server.env_variables.clone();
        let mut mounts = Vec::new();

        if let (Some(state_dir), Some(file_name)) = (state_file.parent(), state_file.file_name()) {
            mounts.push((state_dir.to_path_buf(), STATE_MOUNT.to_string()));
            env.insert(
                "BERTH_STATE_FILE".to_string(),
                format!("{}/{}", STATE_MOUNT, file_name.to_string_lossy()),
            );
        }

        let registry_auth = match (&server.registry_username, &server.registry_password) {
            (Some(user), Some(password)) if !user.is_empty() => {
                Some((user.clone(), password.clone()))
            }
            _ => None,
        };

        Self {
            role: ContainerRole::Active,
            image: server.image.clone(),
            env,
            code_dir: code_dir.map(Path::to_path_buf),
            mounts,
            foreground: true,
            registry_auth,
        }
    }
}

/// A started container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub role: ContainerRole,
}

/// Starts containers and exposes their ports.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn start_container(&self, request: &ContainerRequest) -> Result<ContainerHandle>;

    /// Forward each host port to the same port on the container.
    async fn map_ports(&self, handle: &ContainerHandle, ports: &[u16]) -> Result<()>;
}
