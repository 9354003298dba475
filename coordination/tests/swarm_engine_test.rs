//! Integration tests for the Swarm Handoff Engine
//!
//! Uses scripted in-memory backends to drive every termination status and
//! checks the chain bounds the engine guarantees.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use switchboard_coordination::swarm::{
    BackendError, BackendResult, GenerationBackend, StaticTemplateStore, SwarmConfig,
    SwarmEngine, SwarmSession, SwarmState, SwarmStatus, TemplateStore,
};
use switchboard_coordination::{
    AgentSelector, CapabilityRegistry, ContextMap, IntentClassifier, RoutingStrategy,
};

/// Replays canned responses per agent and records every call.
#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<BackendResult<String>>>>,
    calls: Mutex<Vec<(String, ContextMap)>>,
}

impl ScriptedBackend {
    fn reply(self, agent: &str, text: &str) -> Self {
        self.push(agent, Ok(text.to_string()))
    }

    fn fail(self, agent: &str, err: BackendError) -> Self {
        self.push(agent, Err(err))
    }

    fn push(self, agent: &str, outcome: BackendResult<String>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(agent.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    fn calls(&self) -> Vec<(String, ContextMap)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn invoke(
        &self,
        agent_id: &str,
        _prompt: &str,
        context: &ContextMap,
        _timeout: Duration,
    ) -> BackendResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((agent_id.to_string(), context.clone()));
        self.scripts
            .lock()
            .unwrap()
            .get_mut(agent_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Ok(format!("{agent_id}: final answer")))
    }
}

/// Always hands off to a brand-new agent.
struct RunawayBackend {
    counter: Mutex<usize>,
}

#[async_trait]
impl GenerationBackend for RunawayBackend {
    async fn invoke(
        &self,
        _agent_id: &str,
        _prompt: &str,
        _context: &ContextMap,
        _timeout: Duration,
    ) -> BackendResult<String> {
        let mut n = self.counter.lock().unwrap();
        *n += 1;
        Ok(format!("HANDOFF\nTo: agent_{n}\nReason: not my area"))
    }
}

/// Never answers within any reasonable timeout.
struct StalledBackend;

#[async_trait]
impl GenerationBackend for StalledBackend {
    async fn invoke(
        &self,
        _agent_id: &str,
        _prompt: &str,
        _context: &ContextMap,
        _timeout: Duration,
    ) -> BackendResult<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

struct AnyAgent;

impl TemplateStore for AnyAgent {
    fn get_template(&self, agent_id: &str) -> Option<String> {
        Some(format!("You are {agent_id}. {{{{task}}}}"))
    }
}

fn templates() -> Arc<StaticTemplateStore> {
    Arc::new(StaticTemplateStore::from_registry(&CapabilityRegistry::default()))
}

fn engine(backend: Arc<dyn GenerationBackend>) -> SwarmEngine {
    SwarmEngine::new(backend, templates(), SwarmConfig::default())
}

fn handoff(to: &str, reason: &str) -> String {
    format!("Partial work done.\n\nHANDOFF\nTo: {to}\nReason: {reason}")
}

/// Test: Two-agent chain completes and merges the handoff context
#[tokio::test]
async fn test_dns_to_azure_chain_completes() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .reply(
                "dns_specialist",
                "SPF and DKIM records published.\n\n**HANDOFF**\n**To:** azure_solutions_architect\n**Reason:** connector setup in Exchange Online\nContext:\n- domain: contoso.com\n- dkim_selectors: 2",
            )
            .reply("azure_solutions_architect", "Connector configured; mail flow verified."),
    );
    let engine = engine(backend.clone());
    let mut session = SwarmSession::new();
    session.context.insert("tenant".into(), json!("contoso"));

    let result = engine
        .execute_swarm("dns_specialist", "Set up mail authentication", 5, &mut session)
        .await;

    assert_eq!(result.status, SwarmStatus::Complete);
    assert_eq!(result.final_agent, "azure_solutions_architect");
    assert_eq!(result.final_output, "Connector configured; mail flow verified.");
    assert_eq!(result.handoff_chain.len(), 1);
    let hop = &result.handoff_chain[0];
    assert_eq!(hop.from_agent, "dns_specialist");
    assert_eq!(hop.to_agent, "azure_solutions_architect");
    assert_eq!(hop.sequence_index, 0);
    assert_eq!(hop.context_delta["dkim_selectors"], json!(2));
    assert_eq!(
        result.agents_visited(),
        vec!["dns_specialist", "azure_solutions_architect"]
    );
    assert!(result.termination_reason.is_none());

    // Session context keeps caller keys and gains the delta.
    assert_eq!(session.context["tenant"], json!("contoso"));
    assert_eq!(session.context["domain"], json!("contoso.com"));
    assert_eq!(result.context, session.context);

    // The second hop sees who handed off and why.
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let (agent, ctx) = &calls[1];
    assert_eq!(agent, "azure_solutions_architect");
    assert_eq!(ctx["previous_agent"], json!("dns_specialist"));
    assert_eq!(ctx["handoff_reason"], json!("connector setup in Exchange Online"));
    assert!(ctx["previous_response"]
        .as_str()
        .unwrap()
        .starts_with("SPF and DKIM records published."));
    assert!(!calls[0].1.contains_key("previous_agent"));
}

/// Test: Handing back to an earlier agent stops with CycleDetected
#[tokio::test]
async fn test_handoff_back_is_cycle() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .reply("dns_specialist", &handoff("m365_administrator", "licensing"))
            .reply("m365_administrator", &handoff("dns_specialist", "records again")),
    );
    let mut session = SwarmSession::new();
    let result = engine(backend)
        .execute_swarm("dns_specialist", "task", 5, &mut session)
        .await;

    assert_eq!(result.status, SwarmStatus::CycleDetected);
    assert_eq!(result.handoff_chain.len(), 1);
    assert_eq!(result.hops.len(), 2);
    assert_eq!(result.final_agent, "m365_administrator");
    assert!(result.final_output.contains("records again"));
    assert!(result.termination_reason.unwrap().contains("dns_specialist"));
    assert_eq!(result.transitions.last().unwrap().to, SwarmState::Terminated);
}

/// Test: Self-handoff is a cycle too
#[tokio::test]
async fn test_self_handoff_is_cycle() {
    let backend = Arc::new(
        ScriptedBackend::default().reply("data_analyst", &handoff("data_analyst", "again")),
    );
    let result = engine(backend)
        .execute_swarm("data_analyst", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::CycleDetected);
    assert!(result.handoff_chain.is_empty());
}

/// Test: Chain stops once the handoff budget is spent
#[tokio::test]
async fn test_max_handoffs_exceeded() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .reply("dns_specialist", &handoff("azure_solutions_architect", "one"))
            .reply("azure_solutions_architect", &handoff("m365_administrator", "two"))
            .reply("m365_administrator", &handoff("sre_principal_engineer", "three")),
    );
    let result = engine(backend.clone())
        .execute_swarm("dns_specialist", "task", 2, &mut SwarmSession::new())
        .await;

    assert_eq!(result.status, SwarmStatus::MaxHandoffsExceeded);
    assert_eq!(result.handoff_chain.len(), 2);
    assert_eq!(result.hops.len(), 3);
    assert_eq!(result.final_agent, "m365_administrator");
    assert!(result.final_output.contains("three"));
    assert_eq!(backend.calls().len(), 3);
}

/// Test: A zero budget allows exactly one call
#[tokio::test]
async fn test_zero_handoff_budget() {
    let backend = Arc::new(
        ScriptedBackend::default().reply("dns_specialist", &handoff("data_analyst", "numbers")),
    );
    let result = engine(backend.clone())
        .execute_swarm("dns_specialist", "task", 0, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::MaxHandoffsExceeded);
    assert!(result.handoff_chain.is_empty());
    assert_eq!(backend.calls().len(), 1);
}

/// Test: Handoff to an agent without a template is malformed output
#[tokio::test]
async fn test_unknown_target_is_malformed() {
    let backend = Arc::new(
        ScriptedBackend::default().reply("dns_specialist", &handoff("astrologer", "vibes")),
    );
    let result = engine(backend)
        .execute_swarm("dns_specialist", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::MalformedOutput);
    assert!(result.termination_reason.unwrap().contains("astrologer"));
    assert!(result.handoff_chain.is_empty());
}

/// Test: Handoff block without a target is malformed output
#[tokio::test]
async fn test_marker_without_target_is_malformed() {
    let backend = Arc::new(
        ScriptedBackend::default().reply("dns_specialist", "HANDOFF\nReason: someone else"),
    );
    let result = engine(backend)
        .execute_swarm("dns_specialist", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::MalformedOutput);
    assert_eq!(result.final_output, "HANDOFF\nReason: someone else");
}

/// Test: A drafted memo with a To: line is a final answer, not a handoff
#[tokio::test]
async fn test_memo_reply_completes() {
    let memo = "Here is the announcement:\n\nTo: Bob\nSubject: MX cutover Friday 18:00";
    let backend = Arc::new(ScriptedBackend::default().reply("dns_specialist", memo));
    let result = engine(backend.clone())
        .execute_swarm("dns_specialist", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::Complete);
    assert_eq!(result.final_output, memo);
    assert!(result.handoff_chain.is_empty());
    assert_eq!(backend.calls().len(), 1);
}

/// Test: Backend failures surface as statuses, keeping the partial output
#[tokio::test]
async fn test_backend_errors_terminate_hop() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .reply("dns_specialist", &handoff("azure_solutions_architect", "tenant work"))
            .fail(
                "azure_solutions_architect",
                BackendError::Status {
                    status: 503,
                    body: "overloaded".into(),
                },
            ),
    );
    let result = engine(backend)
        .execute_swarm("dns_specialist", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::HopError);
    assert!(result.final_output.contains("Partial work done."));
    assert_eq!(result.hops.len(), 2);
    assert_eq!(result.hops[1].response_chars, None);
    assert!(result.termination_reason.unwrap().contains("503"));

    let backend = Arc::new(
        ScriptedBackend::default()
            .fail("dns_specialist", BackendError::Timeout(Duration::from_secs(5))),
    );
    let result = engine(backend)
        .execute_swarm("dns_specialist", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::HopTimeout);
    assert_eq!(result.final_output, "");
}

/// Test: The engine enforces the hop timeout itself
#[tokio::test(start_paused = true)]
async fn test_hop_timeout_enforced() {
    let config = SwarmConfig {
        hop_timeout_secs: 2,
        ..SwarmConfig::default()
    };
    let engine = SwarmEngine::new(Arc::new(StalledBackend), templates(), config);
    let result = engine
        .execute_swarm("dns_specialist", "task", 5, &mut SwarmSession::new())
        .await;
    assert_eq!(result.status, SwarmStatus::HopTimeout);
    assert_eq!(result.hops.len(), 1);
    assert!(result.termination_reason.unwrap().contains("timed out"));
}

/// Test: A backend that always hands off never exceeds the budget
#[tokio::test]
async fn test_chain_bounded_for_any_budget() {
    for max in [0usize, 1, 3, 7] {
        let engine = SwarmEngine::new(
            Arc::new(RunawayBackend {
                counter: Mutex::new(0),
            }),
            Arc::new(AnyAgent),
            SwarmConfig::default(),
        );
        let result = engine
            .execute_swarm("agent_0", "task", max, &mut SwarmSession::new())
            .await;
        assert_eq!(result.status, SwarmStatus::MaxHandoffsExceeded, "max={max}");
        assert_eq!(result.handoff_chain.len(), max);
        assert_eq!(result.hops.len(), max + 1);
        for (i, h) in result.handoff_chain.iter().enumerate() {
            assert_eq!(h.sequence_index, i);
            assert!(h.sequence_index < max);
        }
    }
}

/// Test: Routed swarm decision seeds the session context
#[tokio::test]
async fn test_execute_decision_seeds_context() {
    let registry = Arc::new(CapabilityRegistry::default());
    let classifier = IntentClassifier::new(Default::default()).unwrap();
    let selector = AgentSelector::new(registry.clone(), Default::default());
    let query = "Setup DNS authentication and configure Azure Exchange Online";
    let decision = selector.select(&classifier.classify(query), query).unwrap();
    assert_eq!(decision.strategy, RoutingStrategy::Swarm);

    let backend = Arc::new(ScriptedBackend::default());
    let engine = engine(backend.clone());
    let mut session = SwarmSession::new();
    session.context.insert("query".into(), json!("caller wins"));

    let result = engine.execute_decision(&decision, query, &mut session).await;

    assert_eq!(result.status, SwarmStatus::Complete);
    assert_eq!(result.final_agent, decision.initial_agent);
    assert_eq!(session.context["query"], json!("caller wins"));
    assert!(session.context.contains_key("domains_involved"));
    assert_eq!(session.context["swarm_agents"], json!(decision.agents));
    assert_eq!(session.runs, 1);
    assert_eq!(backend.calls()[0].1["intent_category"], json!("operational_task"));
}

/// Test: Batch runs keep input order and isolate sessions
#[tokio::test]
async fn test_execute_batch_in_order() {
    let registry = Arc::new(CapabilityRegistry::default());
    let classifier = IntentClassifier::new(Default::default()).unwrap();
    let selector = AgentSelector::new(registry, Default::default());

    let queries = [
        "How do I configure SPF records for my domain?",
        "Write a SQL query for the revenue dashboard",
        "tell me a joke about penguins",
    ];
    let jobs: Vec<_> = queries
        .iter()
        .map(|q| (selector.select(&classifier.classify(q), q).unwrap(), q.to_string()))
        .collect();

    let backend = Arc::new(
        ScriptedBackend::default()
            .reply("dns_specialist", &handoff("cloud_security_principal", "policy review")),
    );
    let results = engine(backend.clone()).execute_batch(&jobs).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].final_agent, "cloud_security_principal");
    assert_eq!(results[0].handoff_chain.len(), 1);
    assert_eq!(results[1].final_agent, jobs[1].0.initial_agent);
    assert_eq!(results[2].final_agent, "general_assistant");
    assert!(results.iter().all(|r| r.status == SwarmStatus::Complete));
    assert_eq!(results[0].context["query"], json!(queries[0]));
    assert_eq!(results[2].context["query"], json!(queries[2]));
    assert_eq!(backend.calls().len(), 4);
}
