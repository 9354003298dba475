//! Swarm Handoff Engine
//!
//! Executes a bounded chain of agent invocations. Each hop renders the
//! agent's template, calls the generation backend under a per-hop timeout
//! and scans the response for a handoff declaration:
//!
//! ```text
//! Init → AgentActive ──► Complete                  (no handoff)
//!            │  ▲
//!            ▼  │
//!      HandoffRequested ──► CycleDetected ───────┐
//!            │          ──► MalformedOutput ─────┤
//!            │          ──► MaxHandoffsExceeded ─┼──► Terminated
//!  AgentActive ──► HopTimeout | HopError ────────┘
//! ```
//!
//! The loop bounds the chain on its own: at most `max_handoffs + 1`
//! backend calls, whatever the backend does. Nothing is retried.

pub mod backend;
pub mod engine;
pub mod handoff;
pub mod state;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use backend::{
    BackendError, BackendResult, GenerationBackend, StaticTemplateStore, TemplateStore,
    DEFAULT_AGENT_TEMPLATE,
};
pub use engine::{HopRecord, SwarmEngine, SwarmResult, SwarmSession, SwarmStatus};
pub use handoff::{
    HandoffDeclaration, HandoffParse, HandoffParser, HandoffRecord, PatternHandoffParser,
};
pub use state::{IllegalTransition, SwarmState, SwarmStateMachine, TransitionRecord};

/// Protocol instructions appended to every agent prompt.
pub const DEFAULT_HANDOFF_FOOTER: &str = "\
---
If another specialist must continue this task, end your reply with a block:
HANDOFF
To: <agent_id>
Reason: <one line>
Context:
- <key>: <value>
Otherwise answer completely and do not include a HANDOFF block.";

/// Swarm engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Handoff budget used by `execute_decision`.
    pub max_handoffs: usize,
    pub hop_timeout_secs: u64,
    /// Appended to every prompt; empty disables it.
    pub handoff_footer: String,
}

impl SwarmConfig {
    pub fn hop_timeout(&self) -> Duration {
        Duration::from_secs(self.hop_timeout_secs.max(1))
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_handoffs: 5,
            hop_timeout_secs: 60,
            handoff_footer: DEFAULT_HANDOFF_FOOTER.to_string(),
        }
    }
}
