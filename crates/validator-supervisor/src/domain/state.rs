//! # Supervisor State Machine
//!
//! ```text
//!              start/restart
//!  Stopped ───────────────→ Cleaning ──→ GenesisPending ──→ Starting ──→ Running
//!  Running ───────────────→    │               │               │
//!                              └───────────────┴───────────────┴──→ Failed
//!
//!  Running / Starting / Stopped / Failed ──stop──→ Stopped
//! ```
//!
//! The initial state is recomputed from OS observation on every invocation.
//! `Starting` is also a resting state: when the health budget is exhausted the
//! machine stays there (degraded) rather than escalating to `Failed`.

use std::fmt;

use serde::Serialize;
use tracing::info;

use super::errors::SupervisorError;

/// Lifecycle state of the supervised validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Cleaning,
    GenesisPending,
    Starting,
    Running,
    Failed,
}

impl SupervisorState {
    /// Whether `self -> next` is a legal edge.
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (Stopped, Cleaning)
                | (Running, Cleaning)
                | (Cleaning, GenesisPending)
                | (GenesisPending, Starting)
                | (Starting, Running)
                | (Cleaning, Failed)
                | (GenesisPending, Failed)
                | (Starting, Failed)
                | (Running, Stopped)
                | (Starting, Stopped)
                | (Stopped, Stopped)
                | (Failed, Stopped)
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Cleaning => "cleaning",
            SupervisorState::GenesisPending => "genesis-pending",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks the current state and every state entered during one invocation.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: SupervisorState,
    history: Vec<SupervisorState>,
}

impl StateMachine {
    pub fn new(initial: SupervisorState) -> Self {
        Self {
            current: initial,
            history: vec![initial],
        }
    }

    pub fn current(&self) -> SupervisorState {
        self.current
    }

    /// States entered so far, starting with the initial one.
    pub fn history(&self) -> &[SupervisorState] {
        &self.history
    }

    /// Move to `next`, rejecting edges not in the diagram.
    pub fn advance(&mut self, next: SupervisorState) -> Result<(), SupervisorError> {
        if !self.current.can_transition_to(next) {
            return Err(SupervisorError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        info!(from = %self.current, to = %next, "state transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` from whatever in-flight state the machine is in.
    ///
    /// From a state with no edge to `Failed` this is a no-op.
    pub fn fail(&mut self) {
        if self.current.can_transition_to(SupervisorState::Failed) {
            let _ = self.advance(SupervisorState::Failed);
        }
    }
}
