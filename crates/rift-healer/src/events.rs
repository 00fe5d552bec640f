//! Run-state-changed events published on the subscription channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CiStatus, RunStatus, Score};

/// Events emitted whenever a run's stored state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    /// The run moved to a new lifecycle status.
    StatusChanged {
        run_id: String,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },
    /// The run finished.
    Completed {
        run_id: String,
        final_ci_status: Option<CiStatus>,
        score: Option<Score>,
        timestamp: DateTime<Utc>,
    },
    /// The run aborted with an error.
    Error {
        run_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl RunEvent {
    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::StatusChanged { run_id, .. }
            | Self::Completed { run_id, .. }
            | Self::Error { run_id, .. } => run_id,
        }
    }

    /// Whether this event ends the run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = RunEvent::StatusChanged {
            run_id: "abc123".to_string(),
            status: RunStatus::Cloning,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "STATUS_CHANGED");
        assert_eq!(json["run_id"], "abc123");
        assert_eq!(json["status"], "CLONING");
    }
}
