//! Start episode orchestration.
//!
//! [`Sequencer`] drives the startup phases against its [`Collaborators`],
//! then polls the workload until it completes or the deadline passes. The
//! [`StatusRelay`] forwards every sampled state to the control plane.

pub mod error;
pub mod poll;
pub mod relay;
pub mod resources;
pub mod sequencer;

pub use error::{Result, SequencerError};
pub use poll::{poll_until_terminal, PollReport, PollSettings, RunOutcome};
pub use relay::{RelayExit, StatusRelay};
pub use resources::{HostResources, LocalResources, ResourceFactory};
pub use sequencer::{Collaborators, Sequencer, StartOptions, ERROR_STATUS, STARTING_STATUS};
