use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Container {0} is not running")]
    NotRunning(String),

    #[error("Container {0} has no network address")]
    NoAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
