//! Persisted history rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::IntentCategory;
use crate::router::{RoutingDecision, RoutingStrategy};

/// One routed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub query_category: IntentCategory,
    pub query_complexity: u8,
    pub routing_strategy: RoutingStrategy,
    pub confidence: f64,
    pub initial_agent: String,
    #[serde(default)]
    pub agents: Vec<String>,
    /// `None` until feedback arrives.
    #[serde(default)]
    pub accepted: Option<bool>,
}

impl RouteRecord {
    /// Build a pending record for a decision.
    pub fn from_decision(decision: &RoutingDecision, category: IntentCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            query_category: category,
            query_complexity: decision.complexity,
            routing_strategy: decision.strategy,
            confidence: decision.confidence,
            initial_agent: decision.initial_agent.clone(),
            agents: decision.agents.clone(),
            accepted: None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.accepted.is_some()
    }
}

/// Sets `accepted` on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub route_id: Uuid,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(route_id: Uuid, accepted: bool) -> Self {
        Self {
            route_id,
            accepted,
            timestamp: Utc::now(),
        }
    }
}

/// A manual routing override. Correlated with routes by time only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub timestamp: DateTime<Utc>,
    pub override_type: String,
    #[serde(default)]
    pub override_reason: Option<String>,
    pub confidence: f64,
}

impl OverrideRecord {
    pub fn new(override_type: impl Into<String>, reason: Option<String>, confidence: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            override_type: override_type.into(),
            override_reason: reason,
            confidence,
        }
    }
}

/// One line of the routing-history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum HistoryLine {
    Route(RouteRecord),
    Feedback(FeedbackRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_line_is_tagged() {
        let line = HistoryLine::Feedback(FeedbackRecord::new(Uuid::nil(), true));
        let json = serde_json::to_string(&line).unwrap();
        assert!(json.contains(r#""record":"feedback""#));
        let back: HistoryLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_route_record_accepted_defaults_to_pending() {
        let json = r#"{
            "record": "route",
            "id": "00000000-0000-0000-0000-000000000000",
            "timestamp": "2026-01-01T00:00:00Z",
            "query_category": "operational_task",
            "query_complexity": 4,
            "routing_strategy": "swarm",
            "confidence": 0.6,
            "initial_agent": "dns_specialist"
        }"#;
        let line: HistoryLine = serde_json::from_str(json).unwrap();
        let HistoryLine::Route(record) = line else {
            panic!("expected route");
        };
        assert!(!record.is_evaluated());
        assert!(record.agents.is_empty());
        assert_eq!(record.routing_strategy, RoutingStrategy::Swarm);
    }
}
