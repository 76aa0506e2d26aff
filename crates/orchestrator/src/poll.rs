//! The bounded container state poll.
//!
//! States are sampled on a fixed interval and handed to a [`StatusRelay`]
//! through a queue of capacity one. A slot is reserved before each sample,
//! so the loop never samples again until the relay has taken the previous
//! label. A single deadline, armed when polling starts, bounds the whole
//! poll.
//!
//! The wait is `biased`: completion is checked before the deadline, and both
//! before the next hand-off. When completion and the deadline become ready
//! in the same instant the run completes. If the deadline wins while the
//! relay is still reporting a terminal label it already received, the relay
//! finishes that report and the run is still counted as completed.

use api::StatusReporter;
use berth_core::{ContainerState, PollingConfig};
use events::{Event, EventBus};
use runtime::StateProbe;
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::relay::{RelayExit, StatusRelay};

/// Cadence of one poll. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(180),
        }
    }
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            deadline: config.deadline(),
        }
    }
}

/// How a start episode ended once every phase had succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The workload reached the terminal state
    Completed,
    /// The deadline passed first; the last relayed status stands
    TimedOut,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: RunOutcome,
    /// Number of states sampled and handed to the relay
    pub samples: usize,
    pub last_state: Option<ContainerState>,
    pub relay_exit: Option<RelayExit>,
    pub elapsed: Duration,
}

/// Poll `probe` until the relay reports the terminal state or the deadline
/// passes, then wait for the relay task to stop.
pub async fn poll_until_terminal<R>(
    probe: &dyn StateProbe,
    relay: StatusRelay<R>,
    settings: PollSettings,
    events: Option<&EventBus>,
) -> PollReport
where
    R: StatusReporter + ?Sized + 'static,
{
    let started = Instant::now();
    info!(
        interval_ms = settings.interval.as_millis() as u64,
        deadline_ms = settings.deadline.as_millis() as u64,
        "Polling container state"
    );
    if let Some(bus) = events {
        bus.emit(Event::PollingStarted {
            interval_ms: settings.interval.as_millis() as u64,
            deadline_ms: settings.deadline.as_millis() as u64,
        });
    }

    let (label_tx, label_rx) = mpsc::channel::<ContainerState>(1);
    let (done_tx, mut done_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let relay_task = relay.spawn(label_rx, done_tx, cancel_rx);

    let deadline = sleep(settings.deadline);
    tokio::pin!(deadline);

    let mut cancel_tx = Some(cancel_tx);
    let mut next_sample = started;
    let mut samples = 0;
    let mut last_state = None;
    let mut relay_open = true;
    let mut awaiting_done = true;

    let mut outcome = loop {
        tokio::select! {
            biased;

            signal = &mut done_rx, if awaiting_done => {
                if signal.is_ok() {
                    break RunOutcome::Completed;
                }
                // Relay ended without completing; only the deadline is left.
                awaiting_done = false;
            }

            () = &mut deadline => {
                if let Some(cancel) = cancel_tx.take() {
                    let _ = cancel.send(());
                }
                break RunOutcome::TimedOut;
            }

            permit = async {
                sleep_until(next_sample).await;
                label_tx.reserve().await
            }, if relay_open => {
                match permit {
                    Ok(permit) => {
                        let state = probe.sample();
                        samples += 1;
                        debug!(sample = samples, state = %state.as_str(), "Container state sampled");
                        last_state = Some(state.clone());
                        permit.send(state);
                        next_sample = Instant::now() + settings.interval;
                    }
                    Err(_) => {
                        warn!("Status relay stopped early; waiting for deadline");
                        relay_open = false;
                    }
                }
            }
        }
    };

    drop(label_tx);
    let relay_exit = match relay_task.await {
        Ok(exit) => Some(exit),
        Err(e) => {
            warn!(error = %e, "Status relay task failed");
            None
        }
    };

    if outcome == RunOutcome::TimedOut && relay_exit == Some(RelayExit::Completed) {
        debug!("Terminal state was relayed as the deadline passed");
        outcome = RunOutcome::Completed;
    }

    let elapsed = started.elapsed();
    match outcome {
        RunOutcome::Completed => info!(
            samples,
            elapsed_ms = elapsed.as_millis() as u64,
            "Container completed"
        ),
        RunOutcome::TimedOut => warn!(
            samples,
            last_state = ?last_state.as_ref().map(ContainerState::as_str),
            "Timed out waiting for container to complete"
        ),
    }
    if let Some(bus) = events {
        bus.emit(Event::PollingFinished {
            outcome: outcome.to_string(),
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    PollReport {
        outcome,
        samples,
        last_state,
        relay_exit,
        elapsed,
    }
}
