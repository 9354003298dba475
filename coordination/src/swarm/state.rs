//! Swarm State Machine — explicit states and legal transition guards.
//!
//! Every swarm run starts at `Init` and ends at either `Complete` or
//! `Terminated`. Failure states (`MaxHandoffsExceeded`, `MalformedOutput`,
//! `HopTimeout`, `HopError`, `CycleDetected`) are visited exactly once,
//! immediately before `Terminated`, so the transition log records why the
//! run stopped.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmState {
    Init,
    /// An agent is generating.
    AgentActive,
    /// The last response declared a handoff; the target is being checked.
    HandoffRequested,
    /// Terminal success.
    Complete,
    MaxHandoffsExceeded,
    MalformedOutput,
    HopTimeout,
    HopError,
    /// Handoff target was already visited in this chain.
    CycleDetected,
    /// Terminal failure.
    Terminated,
}

impl SwarmState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Terminated)
    }

    /// States that only lead to `Terminated`.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::MaxHandoffsExceeded
                | Self::MalformedOutput
                | Self::HopTimeout
                | Self::HopError
                | Self::CycleDetected
        )
    }
}

impl fmt::Display for SwarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::AgentActive => write!(f, "AgentActive"),
            Self::HandoffRequested => write!(f, "HandoffRequested"),
            Self::Complete => write!(f, "Complete"),
            Self::MaxHandoffsExceeded => write!(f, "MaxHandoffsExceeded"),
            Self::MalformedOutput => write!(f, "MalformedOutput"),
            Self::HopTimeout => write!(f, "HopTimeout"),
            Self::HopError => write!(f, "HopError"),
            Self::CycleDetected => write!(f, "CycleDetected"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Legal transitions.
///
/// ```text
/// Init             → AgentActive
/// AgentActive      → HandoffRequested | Complete | MalformedOutput | HopTimeout | HopError
/// HandoffRequested → AgentActive | CycleDetected | MalformedOutput | MaxHandoffsExceeded
/// <failure state>  → Terminated
/// ```
fn is_legal_transition(from: SwarmState, to: SwarmState) -> bool {
    use SwarmState::*;

    if to == Terminated {
        return from.is_failure();
    }

    matches!(
        (from, to),
        (Init, AgentActive)
            | (AgentActive, HandoffRequested)
            | (AgentActive, Complete)
            | (AgentActive, MalformedOutput)
            | (AgentActive, HopTimeout)
            | (AgentActive, HopError)
            | (HandoffRequested, AgentActive)
            | (HandoffRequested, CycleDetected)
            | (HandoffRequested, MalformedOutput)
            | (HandoffRequested, MaxHandoffsExceeded)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: SwarmState,
    pub to: SwarmState,
    /// Backend call index at the time of transition (0-based).
    pub hop: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Illegal swarm transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: SwarmState,
    pub to: SwarmState,
}

/// Tracks the current swarm state and the full transition log.
#[derive(Debug)]
pub struct SwarmStateMachine {
    current: SwarmState,
    hop: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl SwarmStateMachine {
    pub fn new() -> Self {
        Self {
            current: SwarmState::Init,
            hop: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> SwarmState {
        self.current
    }

    pub fn hop(&self) -> u32 {
        self.hop
    }

    pub fn set_hop(&mut self, hop: u32) {
        self.hop = hop;
    }

    /// Attempt to advance to `to`, recording the transition.
    pub fn advance(&mut self, to: SwarmState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, hop = self.hop, "Swarm state transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            hop: self.hop,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Enter a failure state and then `Terminated`.
    pub fn terminate(&mut self, failure: SwarmState, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(failure, Some(reason))?;
        self.advance(SwarmState::Terminated, None)
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        format!(
            "{} → {} ({} transitions) [{}]",
            SwarmState::Init,
            self.current,
            self.transitions.len(),
            states.join(" → ")
        )
    }
}

impl Default for SwarmStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = SwarmStateMachine::new();
        assert_eq!(sm.current(), SwarmState::Init);
        assert!(!sm.is_terminal());
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_handoff_loop_then_complete() {
        let mut sm = SwarmStateMachine::new();
        sm.advance(SwarmState::AgentActive, Some("dns_specialist"))
            .unwrap();
        sm.advance(SwarmState::HandoffRequested, None).unwrap();
        sm.advance(SwarmState::AgentActive, Some("azure_solutions_architect"))
            .unwrap();
        sm.set_hop(1);
        sm.advance(SwarmState::Complete, None).unwrap();

        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 4);
        assert_eq!(sm.transitions()[3].hop, 1);
    }

    #[test]
    fn test_every_failure_terminates() {
        for (via_handoff, failure) in [
            (false, SwarmState::MalformedOutput),
            (false, SwarmState::HopTimeout),
            (false, SwarmState::HopError),
            (true, SwarmState::MalformedOutput),
            (true, SwarmState::CycleDetected),
            (true, SwarmState::MaxHandoffsExceeded),
        ] {
            let mut sm = SwarmStateMachine::new();
            sm.advance(SwarmState::AgentActive, None).unwrap();
            if via_handoff {
                sm.advance(SwarmState::HandoffRequested, None).unwrap();
            }
            sm.terminate(failure, "test").unwrap();
            assert_eq!(sm.current(), SwarmState::Terminated);
            assert!(sm.is_terminal());
        }
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut sm = SwarmStateMachine::new();
        assert!(sm.advance(SwarmState::Complete, None).is_err());
        assert!(sm.advance(SwarmState::Terminated, None).is_err());

        sm.advance(SwarmState::AgentActive, None).unwrap();
        // Cycle and budget checks only happen on a declared handoff.
        assert!(sm.advance(SwarmState::CycleDetected, None).is_err());
        assert!(sm.advance(SwarmState::MaxHandoffsExceeded, None).is_err());

        sm.advance(SwarmState::Complete, None).unwrap();
        let err = sm.advance(SwarmState::AgentActive, None).unwrap_err();
        assert_eq!(err.from, SwarmState::Complete);
    }
}
