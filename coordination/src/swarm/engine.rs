//! Bounded sequential handoff execution.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::{BackendError, GenerationBackend, TemplateStore, DEFAULT_AGENT_TEMPLATE};
use super::handoff::{HandoffParse, HandoffParser, HandoffRecord, PatternHandoffParser};
use super::state::{SwarmState, SwarmStateMachine, TransitionRecord};
use super::SwarmConfig;
use crate::router::{ContextMap, RoutingDecision};

/// Caller-owned state carried across swarm runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSession {
    pub session_id: Uuid,
    /// Accumulated context. Handoff deltas are merged in, later keys win.
    pub context: ContextMap,
    /// Number of runs executed with this session.
    pub runs: u32,
}

impl SwarmSession {
    pub fn new() -> Self {
        Self::with_context(ContextMap::new())
    }

    pub fn with_context(context: ContextMap) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            context,
            runs: 0,
        }
    }
}

impl Default for SwarmSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStatus {
    Complete,
    MaxHandoffsExceeded,
    MalformedOutput,
    HopTimeout,
    HopError,
    CycleDetected,
}

impl SwarmStatus {
    fn from_failure(state: SwarmState) -> Self {
        match state {
            SwarmState::MaxHandoffsExceeded => Self::MaxHandoffsExceeded,
            SwarmState::MalformedOutput => Self::MalformedOutput,
            SwarmState::HopTimeout => Self::HopTimeout,
            SwarmState::CycleDetected => Self::CycleDetected,
            _ => Self::HopError,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::MaxHandoffsExceeded => write!(f, "max_handoffs_exceeded"),
            Self::MalformedOutput => write!(f, "malformed_output"),
            Self::HopTimeout => write!(f, "hop_timeout"),
            Self::HopError => write!(f, "hop_error"),
            Self::CycleDetected => write!(f, "cycle_detected"),
        }
    }
}

/// One backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopRecord {
    pub agent: String,
    pub latency_ms: u64,
    /// Response length in characters; `None` when the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_chars: Option<usize>,
}

/// Outcome of a swarm run. Always returned, whatever the termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmResult {
    pub status: SwarmStatus,
    /// Last successful response; partial when the run terminated early.
    pub final_output: String,
    pub final_agent: String,
    pub handoff_chain: Vec<HandoffRecord>,
    pub context: ContextMap,
    pub hops: Vec<HopRecord>,
    pub transitions: Vec<TransitionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

impl SwarmResult {
    /// Agents in visit order.
    pub fn agents_visited(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = Vec::with_capacity(self.handoff_chain.len() + 1);
        if let Some(first) = self.handoff_chain.first() {
            agents.push(&first.from_agent);
        }
        agents.extend(self.handoff_chain.iter().map(|h| h.to_agent.as_str()));
        if agents.is_empty() {
            agents.push(&self.final_agent);
        }
        agents
    }

    pub fn total_latency_ms(&self) -> u64 {
        self.hops.iter().map(|h| h.latency_ms).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "status={} hops={} handoffs={} agents=[{}] latency={}ms",
            self.status,
            self.hops.len(),
            self.handoff_chain.len(),
            self.agents_visited().join(" → "),
            self.total_latency_ms()
        )
    }
}

/// Executes bounded handoff chains against a generation backend.
pub struct SwarmEngine {
    backend: Arc<dyn GenerationBackend>,
    templates: Arc<dyn TemplateStore>,
    parser: Box<dyn HandoffParser>,
    config: SwarmConfig,
}

struct RunState {
    machine: SwarmStateMachine,
    chain: Vec<HandoffRecord>,
    hops: Vec<HopRecord>,
    last_output: String,
    current: String,
}

impl SwarmEngine {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        templates: Arc<dyn TemplateStore>,
        config: SwarmConfig,
    ) -> Self {
        Self {
            backend,
            templates,
            parser: Box::new(PatternHandoffParser::new()),
            config,
        }
    }

    /// Replace the handoff parser.
    pub fn with_parser(mut self, parser: Box<dyn HandoffParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Run a routed decision with the configured handoff budget. The
    /// decision's context seeds the session without overwriting keys the
    /// session already holds.
    pub async fn execute_decision(
        &self,
        decision: &RoutingDecision,
        task: &str,
        session: &mut SwarmSession,
    ) -> SwarmResult {
        for (key, value) in &decision.context {
            session
                .context
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if decision.is_swarm() {
            session
                .context
                .entry("swarm_agents".to_string())
                .or_insert_with(|| json!(decision.agents));
        }
        self.execute_swarm(&decision.initial_agent, task, self.config.max_handoffs, session)
            .await
    }

    /// Run independent routed tasks concurrently, each in a fresh session.
    /// Results come back in input order.
    pub async fn execute_batch(&self, jobs: &[(RoutingDecision, String)]) -> Vec<SwarmResult> {
        let runs = jobs.iter().map(|(decision, task)| async move {
            let mut session = SwarmSession::new();
            self.execute_decision(decision, task, &mut session).await
        });
        futures::future::join_all(runs).await
    }

    /// Run a handoff chain starting at `initial_agent`.
    ///
    /// At most `max_handoffs + 1` backend calls are made.
    pub async fn execute_swarm(
        &self,
        initial_agent: &str,
        task: &str,
        max_handoffs: usize,
        session: &mut SwarmSession,
    ) -> SwarmResult {
        session.runs += 1;
        let hop_timeout = self.config.hop_timeout();
        let mut run = RunState {
            machine: SwarmStateMachine::new(),
            chain: Vec::new(),
            hops: Vec::new(),
            last_output: String::new(),
            current: initial_agent.to_string(),
        };
        step(&mut run.machine, SwarmState::AgentActive, Some(initial_agent));

        loop {
            run.machine.set_hop(run.hops.len() as u32);
            let hop_context = self.hop_context(&run, session);
            let prompt = self.build_prompt(&run.current, task, &hop_context);

            debug!(agent = %run.current, hop = run.hops.len(), "Invoking agent");
            let started = Instant::now();
            let outcome = tokio::time::timeout(
                hop_timeout,
                self.backend
                    .invoke(&run.current, &prompt, &hop_context, hop_timeout),
            )
            .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let response = match outcome {
                Ok(Ok(text)) => text,
                Ok(Err(BackendError::Timeout(after))) => {
                    run.hops.push(failed_hop(&run.current, latency_ms));
                    let reason = format!("agent '{}' timed out after {after:?}", run.current);
                    return self.finish(run, session, SwarmState::HopTimeout, reason);
                }
                Ok(Err(e)) => {
                    run.hops.push(failed_hop(&run.current, latency_ms));
                    let reason = format!("agent '{}' failed: {e}", run.current);
                    return self.finish(run, session, SwarmState::HopError, reason);
                }
                Err(_) => {
                    run.hops.push(failed_hop(&run.current, latency_ms));
                    let reason =
                        format!("agent '{}' timed out after {hop_timeout:?}", run.current);
                    return self.finish(run, session, SwarmState::HopTimeout, reason);
                }
            };

            run.hops.push(HopRecord {
                agent: run.current.clone(),
                latency_ms,
                response_chars: Some(response.chars().count()),
            });
            run.last_output = response;

            let declaration = match self.parser.parse(&run.last_output) {
                HandoffParse::Absent => {
                    step(&mut run.machine, SwarmState::Complete, None);
                    return self.finish(run, session, SwarmState::Complete, String::new());
                }
                HandoffParse::Malformed { reason } => {
                    return self.finish(run, session, SwarmState::MalformedOutput, reason);
                }
                HandoffParse::Declared(declaration) => declaration,
            };

            step(
                &mut run.machine,
                SwarmState::HandoffRequested,
                Some(declaration.target_agent.as_str()),
            );
            let target = declaration.target_agent;

            let visited = target == initial_agent
                || run
                    .chain
                    .iter()
                    .any(|h| h.from_agent == target || h.to_agent == target);
            if visited {
                let reason = format!("'{}' handed back to already visited '{target}'", run.current);
                return self.finish(run, session, SwarmState::CycleDetected, reason);
            }
            if !self.templates.exists(&target) {
                let reason = format!("handoff target '{target}' is not a known agent");
                return self.finish(run, session, SwarmState::MalformedOutput, reason);
            }
            if run.chain.len() >= max_handoffs {
                let reason = format!(
                    "handoff to '{target}' would exceed max_handoffs={max_handoffs}"
                );
                return self.finish(run, session, SwarmState::MaxHandoffsExceeded, reason);
            }

            for (key, value) in &declaration.context_delta {
                session.context.insert(key.clone(), value.clone());
            }
            info!(
                from = %run.current,
                to = %target,
                sequence_index = run.chain.len(),
                reason = %declaration.reason,
                "Swarm handoff"
            );
            run.chain.push(HandoffRecord {
                from_agent: run.current.clone(),
                to_agent: target.clone(),
                reason: declaration.reason,
                context_delta: declaration.context_delta,
                sequence_index: run.chain.len(),
            });
            step(&mut run.machine, SwarmState::AgentActive, Some(target.as_str()));
            run.current = target;
        }
    }

    /// Session context plus the previous hop's output, for this hop only.
    fn hop_context(&self, run: &RunState, session: &SwarmSession) -> ContextMap {
        let mut context = session.context.clone();
        if let Some(last) = run.chain.last() {
            context.insert("previous_agent".into(), json!(last.from_agent));
            context.insert("handoff_reason".into(), json!(last.reason));
            context.insert("previous_response".into(), json!(run.last_output));
        }
        context
    }

    fn build_prompt(&self, agent: &str, task: &str, context: &ContextMap) -> String {
        let template = self
            .templates
            .get_template(agent)
            .unwrap_or_else(|| DEFAULT_AGENT_TEMPLATE.to_string());
        let context_text = render_context(context);

        let mut prompt = template.replace("{{agent}}", agent);
        if prompt.contains("{{task}}") {
            prompt = prompt.replace("{{task}}", task);
        } else {
            prompt.push_str(&format!("\n\n## Task\n{task}"));
        }
        if prompt.contains("{{context}}") {
            prompt = prompt.replace("{{context}}", &context_text);
        } else {
            prompt.push_str(&format!("\n\n## Context\n{context_text}"));
        }
        if !self.config.handoff_footer.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.config.handoff_footer);
        }
        prompt
    }

    fn finish(
        &self,
        mut run: RunState,
        session: &SwarmSession,
        state: SwarmState,
        reason: String,
    ) -> SwarmResult {
        let (status, termination_reason) = if state == SwarmState::Complete {
            (SwarmStatus::Complete, None)
        } else {
            if let Err(e) = run.machine.terminate(state, &reason) {
                warn!(error = %e, "Swarm state machine rejected termination");
            }
            (SwarmStatus::from_failure(state), Some(reason))
        };

        let result = SwarmResult {
            status,
            final_output: run.last_output,
            final_agent: run.current,
            handoff_chain: run.chain,
            context: session.context.clone(),
            hops: run.hops,
            transitions: run.machine.into_transitions(),
            termination_reason,
        };

        match result.status {
            SwarmStatus::Complete => info!(session = %session.session_id, "{}", result.summary()),
            _ => warn!(
                session = %session.session_id,
                reason = result.termination_reason.as_deref().unwrap_or(""),
                "Swarm terminated: {}",
                result.summary()
            ),
        }
        result
    }
}

fn step(machine: &mut SwarmStateMachine, to: SwarmState, reason: Option<&str>) {
    if let Err(e) = machine.advance(to, reason) {
        warn!(error = %e, "Swarm state machine rejected transition");
    }
}

fn failed_hop(agent: &str, latency_ms: u64) -> HopRecord {
    HopRecord {
        agent: agent.to_string(),
        latency_ms,
        response_chars: None,
    }
}

/// `- key: value` lines; strings unquoted, other values as JSON.
fn render_context(context: &ContextMap) -> String {
    if context.is_empty() {
        return "(none)".to_string();
    }
    context
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("- {key}: {s}"),
            other => format!("- {key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::StaticTemplateStore;
    use std::time::Duration;

    struct Echo;

    #[async_trait::async_trait]
    impl GenerationBackend for Echo {
        async fn invoke(
            &self,
            _agent_id: &str,
            prompt: &str,
            _context: &ContextMap,
            _timeout: Duration,
        ) -> crate::swarm::BackendResult<String> {
            Ok(prompt.to_string())
        }
    }

    fn engine(templates: StaticTemplateStore, footer: &str) -> SwarmEngine {
        let config = SwarmConfig {
            handoff_footer: footer.to_string(),
            ..SwarmConfig::default()
        };
        SwarmEngine::new(Arc::new(Echo), Arc::new(templates), config)
    }

    #[test]
    fn test_prompt_substitutes_placeholders() {
        let templates = StaticTemplateStore::new()
            .with_template("dns_specialist", "Agent {{agent}}\nTask: {{task}}\nCtx:\n{{context}}");
        let e = engine(templates, "FOOTER");
        let mut ctx = ContextMap::new();
        ctx.insert("tenant".into(), json!("contoso"));
        ctx.insert("users".into(), json!(250));
        let prompt = e.build_prompt("dns_specialist", "fix spf", &ctx);
        assert!(prompt.starts_with("Agent dns_specialist\nTask: fix spf\nCtx:\n- tenant: contoso\n- users: 250"));
        assert!(prompt.ends_with("FOOTER"));
    }

    #[test]
    fn test_prompt_appends_missing_sections() {
        let templates = StaticTemplateStore::new().with_template("a", "You are a.");
        let e = engine(templates, "");
        let prompt = e.build_prompt("a", "do it", &ContextMap::new());
        assert_eq!(prompt, "You are a.\n\n## Task\ndo it\n\n## Context\n(none)");
    }

    #[tokio::test]
    async fn test_plain_response_completes_in_one_hop() {
        let templates = StaticTemplateStore::new().with_template("a", "{{task}}");
        let e = engine(templates, "");
        let mut session = SwarmSession::new();
        let result = e.execute_swarm("a", "hello", 3, &mut session).await;
        assert_eq!(result.status, SwarmStatus::Complete);
        assert_eq!(result.final_output, "hello\n\n## Context\n(none)");
        assert_eq!(result.hops.len(), 1);
        assert!(result.handoff_chain.is_empty());
        assert_eq!(result.agents_visited(), vec!["a"]);
        assert_eq!(session.runs, 1);
    }
}
