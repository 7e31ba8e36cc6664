//! Scheduler lifecycle state machine.
//!
//! State transitions are strictly linear:
//! IDLE → RUNNING → DRAINING → TERMINATED
//!
//! There is no path back to RUNNING; a new loop needs a new scheduler.

use crate::error::{SbcError, SbcResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of the periodic scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    /// Constructed; no target time computed yet.
    #[default]
    Idle,
    /// Periodic loop executing.
    Running,
    /// Cancellation or cycle limit observed; no further waits or actions.
    Draining,
    /// Final report emitted.
    Terminated,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Draining => write!(f, "DRAINING"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}

impl SchedulerState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: SchedulerState) -> bool {
        use SchedulerState::{Draining, Idle, Running, Terminated};

        matches!(
            (self, target),
            (Idle, Running) | (Running, Draining) | (Draining, Terminated)
        )
    }

    /// Returns true once the loop can no longer invoke the action.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Draining | Self::Terminated)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: SchedulerState,
    previous: Option<SchedulerState>,
    transition_count: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine starting in IDLE.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: SchedulerState::Idle,
            previous: None,
            transition_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<SchedulerState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: SchedulerState) -> SbcResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(SbcError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.state(), SchedulerState::Idle);

        sm.transition(SchedulerState::Running).unwrap();
        sm.transition(SchedulerState::Draining).unwrap();
        sm.transition(SchedulerState::Terminated).unwrap();

        assert_eq!(sm.state(), SchedulerState::Terminated);
        assert_eq!(sm.previous_state(), Some(SchedulerState::Draining));
        assert_eq!(sm.transition_count(), 3);
    }

    #[test]
    fn test_no_return_to_running() {
        let mut sm = StateMachine::new();
        sm.transition(SchedulerState::Running).unwrap();
        sm.transition(SchedulerState::Draining).unwrap();

        let err = sm.transition(SchedulerState::Running).unwrap_err();
        assert_eq!(
            err,
            SbcError::InvalidStateTransition {
                from: "DRAINING".into(),
                to: "RUNNING".into(),
            }
        );
        assert_eq!(sm.state(), SchedulerState::Draining);
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(SchedulerState::Draining).is_err());
        assert!(sm.transition(SchedulerState::Terminated).is_err());
        assert_eq!(sm.transition_count(), 0);
    }

    #[test]
    fn test_is_stopped() {
        assert!(!SchedulerState::Idle.is_stopped());
        assert!(!SchedulerState::Running.is_stopped());
        assert!(SchedulerState::Draining.is_stopped());
        assert!(SchedulerState::Terminated.is_stopped());
    }
}
