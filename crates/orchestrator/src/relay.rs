//! Forwards sampled container states to the control plane.
//!
//! The relay runs as its own task for the duration of the poll. It consumes
//! labels in the order they were sampled, reports each one, and stops either
//! on the terminal label (firing the completion latch) or when the poller
//! cancels it.

use api::StatusReporter;
use berth_core::{ContainerState, ServerIdentity};
use events::{Event, EventBus};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How the relay task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The terminal label was reported and completion was signaled
    Completed,
    /// The poller cancelled before a terminal label arrived
    Cancelled,
    /// The poller went away without cancelling
    Closed,
}

/// Send one status report, logging instead of failing.
///
/// Returns whether the control plane accepted the report.
pub(crate) async fn report_status<R>(
    reporter: &R,
    identity: &ServerIdentity,
    status: &str,
    events: Option<&EventBus>,
) -> bool
where
    R: StatusReporter + ?Sized,
{
    match reporter.send_instance_status(identity, status).await {
        Ok(()) => {
            debug!(identity = %identity, status = %status, "Status reported");
            if let Some(bus) = events {
                bus.emit(Event::StatusReported {
                    identity: identity.to_string(),
                    status: status.to_string(),
                });
            }
            true
        }
        Err(e) => {
            warn!(identity = %identity, status = %status, error = %e, "Failed to report status");
            if let Some(bus) = events {
                bus.emit(Event::StatusReportFailed {
                    identity: identity.to_string(),
                    status: status.to_string(),
                    error: e.to_string(),
                });
            }
            false
        }
    }
}

pub struct StatusRelay<R: ?Sized> {
    reporter: Arc<R>,
    identity: ServerIdentity,
    events: Option<EventBus>,
}

impl<R> StatusRelay<R>
where
    R: StatusReporter + ?Sized + 'static,
{
    pub fn new(reporter: Arc<R>, identity: ServerIdentity) -> Self {
        Self {
            reporter,
            identity,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Start consuming `labels` on a new task.
    pub fn spawn(
        self,
        labels: mpsc::Receiver<ContainerState>,
        done: oneshot::Sender<()>,
        cancel: oneshot::Receiver<()>,
    ) -> JoinHandle<RelayExit> {
        tokio::spawn(self.run(labels, done, cancel))
    }

    async fn run(
        self,
        mut labels: mpsc::Receiver<ContainerState>,
        done: oneshot::Sender<()>,
        mut cancel: oneshot::Receiver<()>,
    ) -> RelayExit {
        loop {
            tokio::select! {
                biased;

                signal = &mut cancel => {
                    return match signal {
                        Ok(()) => {
                            warn!(identity = %self.identity, "Container start processing timed out");
                            RelayExit::Cancelled
                        }
                        Err(_) => RelayExit::Closed,
                    };
                }

                label = labels.recv() => {
                    let Some(label) = label else {
                        return RelayExit::Closed;
                    };

                    report_status(
                        self.reporter.as_ref(),
                        &self.identity,
                        label.as_str(),
                        self.events.as_ref(),
                    )
                    .await;

                    if label.is_terminal() {
                        info!(identity = %self.identity, "Container reached terminal state");
                        // The poller may already have given up waiting.
                        let _ = done.send(());
                        return RelayExit::Completed;
                    }
                }
            }
        }
    }
}
