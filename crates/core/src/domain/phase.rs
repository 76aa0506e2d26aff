use serde::{Deserialize, Serialize};
use std::fmt;

/// One ordered, fail-fast step of a start episode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StartupPhase {
    ResolveIdentity,
    LoadConfig,
    Authenticate,
    ExchangeToken,
    FetchServerConfig,
    ProvisionUsers,
    FetchCode,
    StartLogContainer,
    StartMainContainer,
    MapPorts,
    PersistConfig,
}

impl StartupPhase {
    /// Every phase, in execution order.
    pub const ALL: [StartupPhase; 11] = [
        Self::ResolveIdentity,
        Self::LoadConfig,
        Self::Authenticate,
        Self::ExchangeToken,
        Self::FetchServerConfig,
        Self::ProvisionUsers,
        Self::FetchCode,
        Self::StartLogContainer,
        Self::StartMainContainer,
        Self::MapPorts,
        Self::PersistConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolveIdentity => "resolve_identity",
            Self::LoadConfig => "load_config",
            Self::Authenticate => "authenticate",
            Self::ExchangeToken => "exchange_token",
            Self::FetchServerConfig => "fetch_server_config",
            Self::ProvisionUsers => "provision_users",
            Self::FetchCode => "fetch_code",
            Self::StartLogContainer => "start_log_container",
            Self::StartMainContainer => "start_main_container",
            Self::MapPorts => "map_ports",
            Self::PersistConfig => "persist_config",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == s)
    }

    /// Whether an authenticated client exists by the time this phase runs,
    /// so a failure can be reported upstream.
    pub fn can_report_failure(&self) -> bool {
        !matches!(
            self,
            Self::ResolveIdentity | Self::LoadConfig | Self::Authenticate
        )
    }
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
