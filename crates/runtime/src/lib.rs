//! Container runtime wrapper and workload state probe.

pub mod docker;
pub mod error;
pub mod probe;
pub mod types;

pub use docker::DockerCli;
pub use error::{Result, RuntimeError};
pub use probe::{FileStateProbe, StateProbe};
pub use types::{ContainerHandle, ContainerRequest, ContainerRole, ContainerRuntime};
