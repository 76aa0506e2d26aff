//! Event types published during a start episode

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An [`Event`] as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    /// Position in the run, starting at zero
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(seq: u64, event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq,
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Everything a run can tell an observer.
///
/// Phases and outcomes are carried as their string names so this crate does
/// not depend on the domain crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    #[serde(rename = "run.started")]
    RunStarted { identity: String },

    #[serde(rename = "phase.started")]
    PhaseStarted { phase: String },

    #[serde(rename = "phase.completed")]
    PhaseCompleted { phase: String },

    #[serde(rename = "phase.failed")]
    PhaseFailed { phase: String, error: String },

    /// A user account could not be provisioned; the run continues
    #[serde(rename = "user.provision_failed")]
    UserProvisionFailed { username: String, error: String },

    #[serde(rename = "status.reported")]
    StatusReported { identity: String, status: String },

    #[serde(rename = "status.report_failed")]
    StatusReportFailed {
        identity: String,
        status: String,
        error: String,
    },

    #[serde(rename = "polling.started")]
    PollingStarted {
        interval_ms: u64,
        deadline_ms: u64,
    },

    #[serde(rename = "polling.finished")]
    PollingFinished { outcome: String, elapsed_ms: u64 },
}

impl Event {
    /// Dotted event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run.started",
            Event::PhaseStarted { .. } => "phase.started",
            Event::PhaseCompleted { .. } => "phase.completed",
            Event::PhaseFailed { .. } => "phase.failed",
            Event::UserProvisionFailed { .. } => "user.provision_failed",
            Event::StatusReported { .. } => "status.reported",
            Event::StatusReportFailed { .. } => "status.report_failed",
            Event::PollingStarted { .. } => "polling.started",
            Event::PollingFinished { .. } => "polling.finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = Event::PhaseFailed {
            phase: "map_ports".to_string(),
            error: "no address".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phase.failed");
        assert_eq!(json["phase"], "map_ports");
        assert_eq!(event.name(), "phase.failed");
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = EventEnvelope::new(7, Event::StatusReported {
            identity: "i-1".to_string(),
            status: "running".to_string(),
        });
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, envelope.id);
        assert_eq!(parsed.seq, 7);
        assert_eq!(parsed.event, envelope.event);
    }
}
