//! External collaborators of the swarm engine: the generation backend and
//! the agent template store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::registry::CapabilityRegistry;
use crate::router::ContextMap;

/// Template used for agents registered without their own text.
pub const DEFAULT_AGENT_TEMPLATE: &str = "You are {{agent}}, a specialist agent.\n\n\
## Task\n{{task}}\n\n\
## Context\n{{context}}\n";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(String),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend response invalid: {0}")]
    InvalidResponse(String),

    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Produces an agent's response text. Implementations must be cancel-safe:
/// the engine drops the future when the hop timeout fires.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn invoke(
        &self,
        agent_id: &str,
        prompt: &str,
        context: &ContextMap,
        timeout: Duration,
    ) -> BackendResult<String>;
}

/// Read-only agent prompt templates.
pub trait TemplateStore: Send + Sync {
    fn get_template(&self, agent_id: &str) -> Option<String>;

    fn exists(&self, agent_id: &str) -> bool {
        self.get_template(agent_id).is_some()
    }
}

/// In-memory template store.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateStore {
    templates: HashMap<String, String>,
}

impl StaticTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registry agent with the default template.
    pub fn from_registry(registry: &CapabilityRegistry) -> Self {
        let mut store = Self::new();
        for agent in registry.all_agents() {
            store.register(agent);
        }
        store
    }

    /// Set an agent's template text.
    pub fn insert(&mut self, agent_id: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(agent_id.into(), template.into());
    }

    /// Register an agent with the default template unless it already has one.
    pub fn register(&mut self, agent_id: impl Into<String>) {
        self.templates
            .entry(agent_id.into())
            .or_insert_with(|| DEFAULT_AGENT_TEMPLATE.to_string());
    }

    pub fn with_template(mut self, agent_id: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(agent_id, template);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateStore for StaticTemplateStore {
    fn get_template(&self, agent_id: &str) -> Option<String> {
        self.templates.get(agent_id).cloned()
    }

    fn exists(&self, agent_id: &str) -> bool {
        self.templates.contains_key(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_registry_registers_all_agents() {
        let registry = CapabilityRegistry::default();
        let store = StaticTemplateStore::from_registry(&registry);
        assert_eq!(store.len(), registry.all_agents().len());
        assert!(store.exists("dns_specialist"));
        assert!(store.exists("general_assistant"));
        assert!(!store.exists("astrologer"));
        assert_eq!(
            store.get_template("dns_specialist").as_deref(),
            Some(DEFAULT_AGENT_TEMPLATE)
        );
    }

    #[test]
    fn test_register_keeps_custom_template() {
        let mut store = StaticTemplateStore::new().with_template("dns_specialist", "custom");
        store.register("dns_specialist");
        assert_eq!(store.get_template("dns_specialist").as_deref(), Some("custom"));
    }
}
