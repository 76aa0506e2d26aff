use berth_core::{CoreError, StartupPhase};
use runtime::{ContainerRole, RuntimeError};
use thiserror::Error;

/// Why a start episode was aborted.
///
/// Each variant wraps the collaborator's error untouched as its source.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("Failed to resolve server identity: {0}")]
    Identity(#[source] host::HostError),

    #[error("Failed to load agent config: {0}")]
    ConfigLoad(#[source] CoreError),

    #[error("Authentication failed: {0}")]
    Auth(#[source] api::ApiError),

    #[error("Security token exchange failed: {0}")]
    TokenExchange(#[source] api::ApiError),

    #[error("Failed to fetch server config: {0}")]
    ServerConfig(#[source] api::ApiError),

    #[error("Failed to fetch code: {0}")]
    CodeFetch(#[source] vcs::VcsError),

    #[error("Failed to start {} container: {source}", role.as_str())]
    ContainerStart {
        role: ContainerRole,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to map ports: {0}")]
    PortMap(#[source] RuntimeError),

    #[error("Failed to persist server config: {0}")]
    Persist(#[source] CoreError),
}

impl SequencerError {
    /// The phase that failed.
    pub fn phase(&self) -> StartupPhase {
        match self {
            Self::Identity(_) => StartupPhase::ResolveIdentity,
            Self::ConfigLoad(_) => StartupPhase::LoadConfig,
            Self::Auth(_) => StartupPhase::Authenticate,
            Self::TokenExchange(_) => StartupPhase::ExchangeToken,
            Self::ServerConfig(_) => StartupPhase::FetchServerConfig,
            Self::CodeFetch(_) => StartupPhase::FetchCode,
            Self::ContainerStart {
                role: ContainerRole::Log,
                ..
            } => StartupPhase::StartLogContainer,
            Self::ContainerStart {
                role: ContainerRole::Active,
                ..
            } => StartupPhase::StartMainContainer,
            Self::PortMap(_) => StartupPhase::MapPorts,
            Self::Persist(_) => StartupPhase::PersistConfig,
        }
    }
}

pub type Result<T> = std::result::Result<T, SequencerError>;
