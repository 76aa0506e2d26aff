//! Domain types shared by every berth crate.
//!
//! - [`ServerIdentity`] - who this host is to the control plane
//! - [`ContainerState`] - labels sampled from the running workload
//! - [`StartupPhase`] - the ordered steps of one start episode
//! - [`AgentConfig`] / [`ServerConfig`] - local and remote configuration

pub mod config;
pub mod domain;
pub mod error;

pub use config::{
    AgentConfig, ConfigLoader, FileConfigLoader, FileServerConfigStore, LoginUser, PollingConfig,
    ServerConfig, ServerConfigStore, DEFAULT_CONFIG_PATH,
};
pub use domain::{ContainerState, ServerIdentity, StartupPhase};
pub use error::{CoreError, Result};
