//! Collaborators whose location on disk comes from the agent config.

use berth_core::{AgentConfig, FileServerConfigStore, ServerConfigStore};
use runtime::{FileStateProbe, StateProbe};
use std::sync::Arc;
use vcs::{CodeFetcher, GitFetcher};

/// Collaborators bound to one loaded [`AgentConfig`].
#[derive(Clone)]
pub struct LocalResources {
    pub code_fetcher: Arc<dyn CodeFetcher>,
    pub probe: Arc<dyn StateProbe>,
    pub config_store: Arc<dyn ServerConfigStore>,
}

/// Builds [`LocalResources`] once the agent config is known.
pub trait ResourceFactory: Send + Sync {
    fn resources(&self, config: &AgentConfig) -> LocalResources;
}

/// Git checkout, state file and JSON store at the configured paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostResources;

impl ResourceFactory for HostResources {
    fn resources(&self, config: &AgentConfig) -> LocalResources {
        LocalResources {
            code_fetcher: Arc::new(GitFetcher::new(&config.code_dir)),
            probe: Arc::new(FileStateProbe::new(&config.state_file)),
            config_store: Arc::new(FileServerConfigStore::new(&config.server_config_path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::ContainerState;
    use std::path::Path;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_host_resources_use_configured_paths() {
        let temp_dir = TempDir::new().unwrap();
        let content = format!(
            r#"
api_host = "https://api.example.com"
client_id = "id"
client_secret = "secret"
stack_id = "stack-1"
state_file = "{state}"
server_config_path = "{server}"
"#,
            state = temp_dir.path().join("state").display(),
            server = temp_dir.path().join("server.json").display(),
        );
        let config = AgentConfig::from_toml(&content, Path::new("berth.toml")).unwrap();
        let resources = HostResources.resources(&config);

        std::fs::write(temp_dir.path().join("state"), "running").unwrap();
        assert_eq!(resources.probe.sample(), ContainerState::Running);

        resources
            .config_store
            .write_updated(&Default::default())
            .await
            .unwrap();
        assert!(temp_dir.path().join("server.json").exists());
    }
}
