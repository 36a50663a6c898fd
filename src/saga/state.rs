use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one saga attempt
///
/// `Started → AppendedToTimeSeries → Committed`, or
/// `Started → AppendedToTimeSeries → Compensating → RolledBack`.
/// Only the terminal states outlive the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Started,
    AppendedToTimeSeries,
    Committed,
    Compensating,
    RolledBack,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "started",
            SagaState::AppendedToTimeSeries => "appended_to_time_series",
            SagaState::Committed => "committed",
            SagaState::Compensating => "compensating",
            SagaState::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Committed | SagaState::RolledBack)
    }

    pub fn can_transition_to(&self, next: SagaState) -> bool {
        matches!(
            (self, next),
            (SagaState::Started, SagaState::AppendedToTimeSeries)
                | (SagaState::AppendedToTimeSeries, SagaState::Committed)
                | (SagaState::AppendedToTimeSeries, SagaState::Compensating)
                | (SagaState::Compensating, SagaState::RolledBack)
        )
    }

    /// Move to `next`, logging the transition
    pub(crate) fn advance(self, next: SagaState) -> SagaState {
        debug_assert!(self.can_transition_to(next), "{} -> {}", self, next);
        tracing::debug!("saga {} -> {}", self, next);
        next
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal result of an attempt that did not double-fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SagaOutcome {
    Committed { txn_id: String, rows: usize },
    RolledBack { txn_id: String, cause: String },
}

impl SagaOutcome {
    pub fn txn_id(&self) -> &str {
        match self {
            SagaOutcome::Committed { txn_id, .. } | SagaOutcome::RolledBack { txn_id, .. } => txn_id,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, SagaOutcome::Committed { .. })
    }

    pub fn state(&self) -> SagaState {
        match self {
            SagaOutcome::Committed { .. } => SagaState::Committed,
            SagaOutcome::RolledBack { .. } => SagaState::RolledBack,
        }
    }
}
