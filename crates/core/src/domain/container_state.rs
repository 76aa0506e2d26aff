use serde::{Deserialize, Serialize};
use std::fmt;

/// A state label sampled from the running workload container.
///
/// Only [`ContainerState::Complete`] is terminal. Labels the agent does not
/// know are carried through verbatim so the control plane still sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContainerState {
    Starting,
    Running,
    Complete,
    Error,
    /// A label outside the known set. Parsing never produces this for a
    /// known label; a hand-built `Unknown("complete")` is still terminal.
    Unknown(String),
}

impl ContainerState {
    /// The literal tag that ends polling.
    pub const TERMINAL: &'static str = "complete";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Complete => Self::TERMINAL,
            Self::Error => "error",
            Self::Unknown(label) => label,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.as_str() == Self::TERMINAL
    }
}

impl From<&str> for ContainerState {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "starting" => Self::Starting,
            "running" => Self::Running,
            "complete" => Self::Complete,
            "error" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ContainerState {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<ContainerState> for String {
    fn from(state: ContainerState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
