use crate::error::{Result, UmbraError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a resumable replay run.
///
/// Lifecycle: `created → prepared → initial_replay → ready_for_activation
/// → [incremental_replay → ready_for_activation]* → done`, with `aborted`
/// reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPhase {
    Created,
    Prepared,
    InitialReplay,
    ReadyForActivation,
    IncrementalReplay,
    Done,
    Aborted,
}

impl ReplayPhase {
    pub const NON_TERMINAL: &'static [ReplayPhase] = &[
        ReplayPhase::Created,
        ReplayPhase::Prepared,
        ReplayPhase::InitialReplay,
        ReplayPhase::ReadyForActivation,
        ReplayPhase::IncrementalReplay,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ReplayPhase::Done | ReplayPhase::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReplayPhase::Created => "created",
            ReplayPhase::Prepared => "prepared",
            ReplayPhase::InitialReplay => "initial_replay",
            ReplayPhase::ReadyForActivation => "ready_for_activation",
            ReplayPhase::IncrementalReplay => "incremental_replay",
            ReplayPhase::Done => "done",
            ReplayPhase::Aborted => "aborted",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(ReplayPhase::Created),
            "prepared" => Ok(ReplayPhase::Prepared),
            "initial_replay" => Ok(ReplayPhase::InitialReplay),
            "ready_for_activation" => Ok(ReplayPhase::ReadyForActivation),
            "incremental_replay" => Ok(ReplayPhase::IncrementalReplay),
            "done" => Ok(ReplayPhase::Done),
            "aborted" => Ok(ReplayPhase::Aborted),
            other => Err(UmbraError::InvalidState(format!(
                "unknown replay phase '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ReplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one replay run.
///
/// At most one non-terminal row exists at a time; the store enforces this
/// with a partial uniqueness constraint over the non-terminal phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayState {
    pub id: i64,
    pub state: ReplayPhase,
    pub projector_names: Vec<String>,

    /// Watermark: events with `xact_id` below this have been replayed
    pub continue_replay_at_xact_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round_trip() {
        for phase in [
            ReplayPhase::Created,
            ReplayPhase::Prepared,
            ReplayPhase::InitialReplay,
            ReplayPhase::ReadyForActivation,
            ReplayPhase::IncrementalReplay,
            ReplayPhase::Done,
            ReplayPhase::Aborted,
        ] {
            assert_eq!(ReplayPhase::parse(phase.as_str()).unwrap(), phase);
        }
        assert!(ReplayPhase::parse("replaying").is_err());
    }

    #[test]
    fn test_terminal_phases() {
        assert!(ReplayPhase::Done.is_terminal());
        assert!(ReplayPhase::Aborted.is_terminal());
        for phase in ReplayPhase::NON_TERMINAL {
            assert!(!phase.is_terminal());
        }
    }
}
