//! Switchboard coordination library
//!
//! Routes free-text requests to specialist agents and measures how well that
//! routing works:
//! - Intent classification: domains, category, complexity, entities, confidence
//! - Agent selection: single specialist or multi-agent swarm
//! - Coordinator: classify + select + persist, with in-process stats
//! - Bounded swarm handoffs between agents
//! - Routing accuracy analytics over the persisted history
//! - A/B quality validation of agent variants
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchboard_coordination::{
//!     CapabilityRegistry, Coordinator, JsonlHistoryStore, RoutingConfig,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RoutingConfig::from_env();
//! let registry = Arc::new(CapabilityRegistry::default());
//! let store = Arc::new(JsonlHistoryStore::open("./routing-history")?);
//! let coordinator = Coordinator::from_config(&config, registry, store)?;
//!
//! let decision = coordinator.route("Why is my SPF record failing validation?")?;
//! println!("{}", decision.summary());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod analytics;
pub mod config;
pub mod coordinator;
pub mod history;
pub mod intent;
pub mod quality;
pub mod registry;
pub mod router;
pub mod swarm;

// Re-export configuration types
pub use config::{ConfigError, ConfigResult, RoutingConfig};

// Re-export intent types
pub use intent::{CategoryClarity, Entities, Intent, IntentCategory, IntentClassifier};

// Re-export registry types
pub use registry::{CapabilityRegistry, RegistryError, RegistryResult, DEFAULT_GENERAL_AGENT};

// Re-export selector types
pub use router::{
    AgentSelector, ContextMap, RoutingDecision, RoutingError, RoutingResult, RoutingStrategy,
    SelectorConfig,
};

// Re-export coordinator types
pub use coordinator::{AgentUsage, Coordinator, RoutingStats};

// Re-export history types
pub use history::{
    HistoryError, HistoryResult, HistoryStore, JsonlHistoryStore, MemoryHistoryStore,
    OverrideRecord, RouteRecord,
};

// Re-export swarm types
pub use swarm::{
    BackendError, BackendResult, GenerationBackend, HandoffRecord, StaticTemplateStore,
    SwarmConfig, SwarmEngine, SwarmResult, SwarmSession, SwarmStatus, TemplateStore,
};

// Re-export analytics types
pub use analytics::{AccuracyAnalyzer, AccuracyReport, AnalyticsError, AnalyzerConfig};

// Re-export quality types
pub use quality::{
    ABTestFramework, ABTestResult, DeployRecommendation, ExperimentConfig, ExperimentError,
    ExperimentSample, QualityScore, ResponseSignals,
};
