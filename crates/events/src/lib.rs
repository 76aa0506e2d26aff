//! Run events for the berth agent
//!
//! The sequencer publishes what it does onto an [`EventBus`] handed to it by
//! the caller, so a run can be observed without any process-wide state.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
