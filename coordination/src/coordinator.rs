//! Routing coordinator.
//!
//! Runs classifier and selector per request, appends the decision to the
//! history store and keeps process-lifetime routing statistics.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigResult, RoutingConfig};
use crate::history::{FeedbackRecord, HistoryResult, HistoryStore, OverrideRecord, RouteRecord};
use crate::intent::{Intent, IntentClassifier};
use crate::registry::CapabilityRegistry;
use crate::router::{AgentSelector, RoutingDecision, RoutingResult, RoutingStrategy};

/// Usage count for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUsage {
    pub agent: String,
    pub count: u64,
}

/// Routing statistics for this process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total_routes: u64,
    pub strategies: BTreeMap<RoutingStrategy, u64>,
    /// Count descending, then agent id.
    pub most_used_agents: Vec<AgentUsage>,
}

#[derive(Debug, Default)]
struct StatsInner {
    total_routes: u64,
    strategies: BTreeMap<RoutingStrategy, u64>,
    agents: HashMap<String, u64>,
}

/// Per-request routing entry point. `Send + Sync`.
pub struct Coordinator {
    classifier: Arc<IntentClassifier>,
    selector: AgentSelector,
    store: Arc<dyn HistoryStore>,
    stats: Mutex<StatsInner>,
}

impl Coordinator {
    pub fn new(
        classifier: Arc<IntentClassifier>,
        selector: AgentSelector,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            classifier,
            selector,
            store,
            stats: Mutex::new(StatsInner::default()),
        }
    }

    /// Build classifier and selector from configuration.
    pub fn from_config(
        config: &RoutingConfig,
        registry: Arc<CapabilityRegistry>,
        store: Arc<dyn HistoryStore>,
    ) -> ConfigResult<Self> {
        let classifier = Arc::new(IntentClassifier::new(config.classifier.clone())?);
        let selector = AgentSelector::new(registry, config.selector.clone());
        Ok(Self::new(classifier, selector, store))
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn classify(&self, query: &str) -> Intent {
        self.classifier.classify(query)
    }

    /// Route a query. History append failures are logged, never returned.
    pub fn route(&self, query: &str) -> RoutingResult<RoutingDecision> {
        self.route_detailed(query).map(|(_, decision)| decision)
    }

    /// Route a query and also return the intent it was classified as.
    pub fn route_detailed(&self, query: &str) -> RoutingResult<(Intent, RoutingDecision)> {
        let intent = self.classifier.classify(query);
        let mut decision = self.selector.select(&intent, query)?;

        let record = RouteRecord::from_decision(&decision, intent.category);
        match self.store.append_route(&record) {
            Ok(()) => decision.route_id = Some(record.id),
            Err(e) => warn!(error = %e, "Failed to persist routing decision"),
        }

        self.record_stats(&decision);
        info!(
            route_id = ?decision.route_id,
            category = %intent.category,
            complexity = intent.complexity,
            strategy = %decision.strategy,
            initial_agent = %decision.initial_agent,
            confidence = decision.confidence,
            "Routed query"
        );
        Ok((intent, decision))
    }

    fn record_stats(&self, decision: &RoutingDecision) {
        let Ok(mut stats) = self.stats.lock() else {
            warn!("Routing stats lock poisoned; skipping stats update");
            return;
        };
        stats.total_routes += 1;
        *stats.strategies.entry(decision.strategy).or_insert(0) += 1;
        for agent in &decision.agents {
            *stats.agents.entry(agent.clone()).or_insert(0) += 1;
        }
    }

    pub fn get_routing_stats(&self) -> RoutingStats {
        let Ok(stats) = self.stats.lock() else {
            return RoutingStats::default();
        };
        let mut most_used: Vec<AgentUsage> = stats
            .agents
            .iter()
            .map(|(agent, count)| AgentUsage {
                agent: agent.clone(),
                count: *count,
            })
            .collect();
        most_used.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.agent.cmp(&b.agent)));
        RoutingStats {
            total_routes: stats.total_routes,
            strategies: stats.strategies.clone(),
            most_used_agents: most_used,
        }
    }

    /// Record whether the routed answer was accepted.
    pub fn record_feedback(&self, route_id: Uuid, accepted: bool) -> HistoryResult<()> {
        self.store
            .append_feedback(&FeedbackRecord::new(route_id, accepted))?;
        info!(%route_id, accepted, "Recorded routing feedback");
        Ok(())
    }

    /// Record a manual routing override.
    pub fn record_override(
        &self,
        override_type: &str,
        reason: Option<String>,
        confidence: f64,
    ) -> HistoryResult<()> {
        self.store
            .append_override(&OverrideRecord::new(override_type, reason, confidence))?;
        info!(override_type, confidence, "Recorded routing override");
        Ok(())
    }
}
