//! Local agent configuration and the server configuration fetched from the
//! control plane.

mod agent;
mod server;

pub use agent::{AgentConfig, ConfigLoader, FileConfigLoader, PollingConfig, DEFAULT_CONFIG_PATH};
pub use server::{FileServerConfigStore, LoginUser, ServerConfig, ServerConfigStore};
