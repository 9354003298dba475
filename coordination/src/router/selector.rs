//! Agent selection and routing-strategy decision.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::error::{RoutingError, RoutingResult};
use crate::intent::Intent;
use crate::registry::CapabilityRegistry;

/// Shared context mapping handed to agents.
pub type ContextMap = serde_json::Map<String, Value>;

/// Selector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Complexity at or above which a single-domain request still goes to a swarm.
    pub swarm_complexity_threshold: u8,
    /// Minimum intent confidence for a single-agent route.
    pub single_agent_min_confidence: f64,
    pub max_swarm_agents: usize,
    /// Multiplier on intent confidence for swarm routes.
    pub swarm_penalty: f64,
    /// Multiplier on intent confidence for the general-agent fallback.
    pub general_penalty: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            swarm_complexity_threshold: 7,
            single_agent_min_confidence: 0.6,
            max_swarm_agents: 4,
            swarm_penalty: 0.85,
            general_penalty: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    SingleAgent,
    Swarm,
}

impl RoutingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleAgent => "single_agent",
            Self::Swarm => "swarm",
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of agent selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub strategy: RoutingStrategy,
    pub initial_agent: String,
    /// Ordered, deduplicated. Length >= 2 iff `strategy == Swarm`.
    pub agents: Vec<String>,
    pub confidence: f64,
    pub context: ContextMap,
    pub reasoning: String,
    pub complexity: u8,
    /// Set by the coordinator once the decision is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<Uuid>,
}

impl RoutingDecision {
    pub fn is_swarm(&self) -> bool {
        self.strategy == RoutingStrategy::Swarm
    }

    /// Compact summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "strategy={} agents=[{}] confidence={:.2}",
            self.strategy,
            self.agents.join(","),
            self.confidence
        )
    }
}

/// Chooses agents for a classified intent.
#[derive(Debug, Clone)]
pub struct AgentSelector {
    registry: Arc<CapabilityRegistry>,
    config: SelectorConfig,
}

impl AgentSelector {
    pub fn new(registry: Arc<CapabilityRegistry>, config: SelectorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select a routing strategy and agent list. Pure apart from the
    /// read-only registry.
    pub fn select(&self, intent: &Intent, raw_query: &str) -> RoutingResult<RoutingDecision> {
        if self.registry.is_empty() {
            return Err(RoutingError::EmptyRegistry);
        }

        let mut context = ContextMap::new();
        context.insert("query".into(), json!(raw_query));
        context.insert("intent_category".into(), json!(intent.category.as_str()));
        context.insert(
            "entities".into(),
            serde_json::to_value(&intent.entities).unwrap_or(Value::Null),
        );
        context.insert("complexity".into(), json!(intent.complexity));

        // Domains that actually have candidates, in intent order.
        let matched: Vec<(&str, &[String])> = if intent.is_general() {
            Vec::new()
        } else {
            intent
                .domains
                .iter()
                .map(|d| (d.as_str(), self.registry.candidates(d)))
                .filter(|(_, agents)| !agents.is_empty())
                .collect()
        };

        let decision = if matched.is_empty() {
            self.general_decision(intent, context)
        } else if matched.len() == 1
            && intent.complexity < self.config.swarm_complexity_threshold
            && intent.confidence >= self.config.single_agent_min_confidence
        {
            let (domain, agents) = matched[0];
            let agent = agents[0].clone();
            RoutingDecision {
                strategy: RoutingStrategy::SingleAgent,
                initial_agent: agent.clone(),
                agents: vec![agent],
                confidence: intent.confidence,
                context,
                reasoning: format!(
                    "single domain '{domain}', complexity {} < {}, confidence {:.2} >= {:.2}",
                    intent.complexity,
                    self.config.swarm_complexity_threshold,
                    intent.confidence,
                    self.config.single_agent_min_confidence
                ),
                complexity: intent.complexity,
                route_id: None,
            }
        } else {
            self.swarm_decision(intent, &matched, context)
        };

        debug!(
            strategy = %decision.strategy,
            agents = ?decision.agents,
            confidence = decision.confidence,
            "Agent selection complete"
        );
        Ok(decision)
    }

    fn general_agent(&self) -> String {
        let general = self.registry.general_agent();
        if general.is_empty() {
            // Unvalidated registry without a general agent: fall back to any agent.
            self.registry
                .all_agents()
                .into_iter()
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            general.to_string()
        }
    }

    fn general_decision(&self, intent: &Intent, context: ContextMap) -> RoutingDecision {
        let agent = self.general_agent();
        RoutingDecision {
            strategy: RoutingStrategy::SingleAgent,
            initial_agent: agent.clone(),
            agents: vec![agent],
            confidence: round3(intent.confidence * self.config.general_penalty),
            context,
            reasoning: format!(
                "no matched domain with candidates (domains=[{}]); general fallback",
                intent.domains.join(",")
            ),
            complexity: intent.complexity,
            route_id: None,
        }
    }

    fn swarm_decision(
        &self,
        intent: &Intent,
        matched: &[(&str, &[String])],
        mut context: ContextMap,
    ) -> RoutingDecision {
        let cap = self.config.max_swarm_agents.max(1);
        let mut agents: Vec<String> = Vec::new();
        let depth = matched.iter().map(|(_, a)| a.len()).max().unwrap_or(0);
        'outer: for rank in 0..depth {
            for (_, candidates) in matched {
                if let Some(agent) = candidates.get(rank) {
                    if !agents.contains(agent) {
                        agents.push(agent.clone());
                        if agents.len() >= cap {
                            break 'outer;
                        }
                    }
                }
            }
        }

        let general = self.general_agent();
        if agents.len() < 2 && !agents.contains(&general) {
            agents.push(general.clone());
        }

        let domains: Vec<&str> = matched.iter().map(|(d, _)| *d).collect();
        let why = if domains.len() > 1 {
            format!("{} domains", domains.len())
        } else if intent.complexity >= self.config.swarm_complexity_threshold {
            format!(
                "complexity {} >= {}",
                intent.complexity, self.config.swarm_complexity_threshold
            )
        } else {
            format!(
                "confidence {:.2} < {:.2}",
                intent.confidence, self.config.single_agent_min_confidence
            )
        };

        if agents.len() < 2 {
            let agent = agents.pop().unwrap_or(general);
            let confidence = if agent == self.registry.general_agent() {
                intent.confidence * self.config.general_penalty
            } else {
                intent.confidence
            };
            return RoutingDecision {
                strategy: RoutingStrategy::SingleAgent,
                initial_agent: agent.clone(),
                agents: vec![agent],
                confidence: round3(confidence),
                context,
                reasoning: format!("swarm wanted ({why}) but only one distinct agent available"),
                complexity: intent.complexity,
                route_id: None,
            };
        }

        context.insert("domains_involved".into(), json!(domains));
        RoutingDecision {
            strategy: RoutingStrategy::Swarm,
            initial_agent: agents[0].clone(),
            confidence: round3(intent.confidence * self.config.swarm_penalty),
            reasoning: format!(
                "swarm across [{}]: {why}; {} agents",
                domains.join(","),
                agents.len()
            ),
            agents,
            context,
            complexity: intent.complexity,
            route_id: None,
        }
    }
}

fn round3(value: f64) -> f64 {
    ((value * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
}
