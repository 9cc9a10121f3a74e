//! Retry episode state machine.
//!
//! Only the edges listed in [`RetryState::can_transition_to`] are legal.
//! Every accepted transition is logged and kept in the trace returned
//! with the episode report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Init,
    Validating,
    Passed,
    Analyzing,
    Selecting,
    Adjusting,
    Generating,
    BudgetExceeded,
    Exhausted,
    Cancelled,
    Done,
}

impl RetryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Validating => "validating",
            Self::Passed => "passed",
            Self::Analyzing => "analyzing",
            Self::Selecting => "selecting",
            Self::Adjusting => "adjusting",
            Self::Generating => "generating",
            Self::BudgetExceeded => "budget_exceeded",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
            Self::Done => "done",
        }
    }

    /// Whether this state ends the loop. Terminal states lead only to `Done`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Passed | Self::BudgetExceeded | Self::Exhausted | Self::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: RetryState) -> bool {
        use RetryState::*;
        matches!(
            (self, next),
            (Init, Validating)
                | (Validating, Passed | Analyzing | Exhausted)
                | (Analyzing, Selecting)
                | (Selecting, Adjusting | BudgetExceeded | Cancelled)
                | (Adjusting, Generating)
                | (Generating, Validating | Analyzing | Exhausted)
                | (Passed | BudgetExceeded | Exhausted | Cancelled, Done)
        )
    }
}

impl std::fmt::Display for RetryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RetryState,
    pub to: RetryState,
    /// Loop attempt (1-based) in progress, 0 before the loop starts
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// Checked state machine with a transition trace.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: RetryState,
    trace: Vec<StateTransition>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: RetryState::Init,
            trace: Vec::new(),
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn trace(&self) -> &[StateTransition] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<StateTransition> {
        self.trace
    }

    /// Move to `next`, or fail with [`Error::StateTransition`] if the edge is illegal.
    pub fn transition(&mut self, next: RetryState, attempt: u32) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::state_transition(self.state, next));
        }
        debug!(from = %self.state, to = %next, attempt, "State transition");
        self.trace.push(StateTransition {
            from: self.state,
            to: next,
            attempt,
            at: Utc::now(),
        });
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_happy_path() {
        let mut machine = StateMachine::new();
        for next in [
            RetryState::Validating,
            RetryState::Analyzing,
            RetryState::Selecting,
            RetryState::Adjusting,
            RetryState::Generating,
            RetryState::Validating,
            RetryState::Passed,
            RetryState::Done,
        ] {
            machine.transition(next, 1).unwrap();
        }
        assert_eq!(machine.state(), RetryState::Done);
        assert_eq!(machine.trace().len(), 8);
        assert_eq!(machine.trace()[0].from, RetryState::Init);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut machine = StateMachine::new();
        let err = machine.transition(RetryState::Generating, 0).unwrap_err();
        assert!(matches!(err, Error::StateTransition { .. }));
        assert_eq!(err.to_string(), "Illegal state transition: init -> generating");
        assert_eq!(machine.state(), RetryState::Init);
        assert!(machine.trace().is_empty());
    }

    #[test]
    fn test_done_is_final() {
        let all = [
            RetryState::Init,
            RetryState::Validating,
            RetryState::Passed,
            RetryState::Analyzing,
            RetryState::Selecting,
            RetryState::Adjusting,
            RetryState::Generating,
            RetryState::BudgetExceeded,
            RetryState::Exhausted,
            RetryState::Cancelled,
            RetryState::Done,
        ];
        for next in all {
            assert!(!RetryState::Done.can_transition_to(next));
        }
        for state in all.into_iter().filter(RetryState::is_terminal) {
            assert!(state.can_transition_to(RetryState::Done));
            assert!(!state.can_transition_to(RetryState::Validating));
        }
    }
}
