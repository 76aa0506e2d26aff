use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Unknown identity provider: {0}")]
    UnknownProvider(String),

    #[error("Metadata request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid metadata response: {0}")]
    InvalidResponse(String),

    #[error("Invalid user {username}: {reason}")]
    InvalidUser { username: String, reason: String },

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;
