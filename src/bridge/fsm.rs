use super::types::InferenceResult;
use crate::{Error, Result};
use tracing::{debug, warn};
use uuid::Uuid;

// Call states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Succeeded,
    Failed,
    TimedOut,
}

// Call events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Completed,
    Failed,
    DeadlineElapsed,
}

impl From<&InferenceResult> for CallEvent {
    fn from(result: &InferenceResult) -> Self {
        match result {
            InferenceResult::Success { .. } => Self::Completed,
            InferenceResult::Failure { .. } => Self::Failed,
        }
    }
}

/// Lifecycle of a single bridge call. The first terminal event wins; every
/// later event is rejected.
pub struct CallStateMachine {
    call_id: Uuid,
    state: CallState,
}

impl CallStateMachine {
    pub fn new(call_id: Uuid) -> Self {
        Self {
            call_id,
            state: CallState::Pending,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn current_state(&self) -> CallState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, CallState::Pending)
    }

    pub fn transition(&mut self, event: CallEvent) -> Result<CallState> {
        let new_state = match (self.state, event) {
            (CallState::Pending, CallEvent::Completed) => CallState::Succeeded,
            (CallState::Pending, CallEvent::Failed) => CallState::Failed,
            (CallState::Pending, CallEvent::DeadlineElapsed) => CallState::TimedOut,
            (current, requested) => {
                warn!(
                    call_id = %self.call_id,
                    "Rejected {:?} for call already in {:?}", requested, current
                );
                return Err(Error::InvalidTransition {
                    current: format!("{current:?}"),
                    requested: format!("{requested:?}"),
                });
            }
        };

        debug!(
            call_id = %self.call_id,
            "Call state transition: {:?} -> {:?} (event: {:?})", self.state, new_state, event
        );

        self.state = new_state;
        Ok(new_state)
    }
}
