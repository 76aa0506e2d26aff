mod container_state;
mod identity;
mod phase;

pub use container_state::ContainerState;
pub use identity::ServerIdentity;
pub use phase::StartupPhase;
