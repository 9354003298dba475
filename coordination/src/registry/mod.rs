//! Capability Registry — domain to ranked agent ids
//!
//! Built once at startup (stock table or a `[registry]` TOML table), shared
//! as `Arc<CapabilityRegistry>` and never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Agent used when a query matches no configured domain.
pub const DEFAULT_GENERAL_AGENT: &str = "general_assistant";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Domain '{domain}' lists agent '{agent}' more than once")]
    DuplicateAgent { domain: String, agent: String },

    #[error("Domain '{domain}' has an empty agent id")]
    EmptyAgentId { domain: String },

    #[error("Registry has no general agent")]
    MissingGeneralAgent,

    #[error("Failed to parse registry table: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

fn default_general_agent() -> String {
    DEFAULT_GENERAL_AGENT.to_string()
}

/// Read-only mapping of domain → ranked candidate agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRegistry {
    /// Best candidate first.
    #[serde(default)]
    domains: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_general_agent")]
    general_agent: String,
}

impl CapabilityRegistry {
    /// Build and validate a registry.
    pub fn new(
        domains: BTreeMap<String, Vec<String>>,
        general_agent: impl Into<String>,
    ) -> RegistryResult<Self> {
        let registry = Self {
            domains,
            general_agent: general_agent.into(),
        };
        registry.validate()?;
        Ok(registry)
    }

    /// A registry with no agents at all. Selection over it fails.
    pub fn empty() -> Self {
        Self {
            domains: BTreeMap::new(),
            general_agent: String::new(),
        }
    }

    /// Parse and validate a TOML table of the form
    ///
    /// ```toml
    /// general_agent = "general_assistant"
    /// [domains]
    /// dns = ["dns_specialist", "cloud_security_principal"]
    /// ```
    pub fn from_toml_str(text: &str) -> RegistryResult<Self> {
        let registry: Self = toml::from_str(text)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Ranked candidates for a domain; empty for unknown domains.
    pub fn candidates(&self, domain: &str) -> &[String] {
        self.domains.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Best candidate for a domain.
    pub fn top(&self, domain: &str) -> Option<&str> {
        self.candidates(domain).first().map(String::as_str)
    }

    pub fn general_agent(&self) -> &str {
        &self.general_agent
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    /// Every distinct agent id, general agent included, sorted.
    pub fn all_agents(&self) -> BTreeSet<&str> {
        let mut agents: BTreeSet<&str> = self
            .domains
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        if !self.general_agent.is_empty() {
            agents.insert(&self.general_agent);
        }
        agents
    }

    pub fn contains_agent(&self, agent_id: &str) -> bool {
        self.general_agent == agent_id
            || self
                .domains
                .values()
                .any(|agents| agents.iter().any(|a| a == agent_id))
    }

    /// Whether no agent can ever be selected.
    pub fn is_empty(&self) -> bool {
        self.general_agent.is_empty() && self.domains.values().all(Vec::is_empty)
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if self.general_agent.trim().is_empty() {
            return Err(RegistryError::MissingGeneralAgent);
        }
        for (domain, agents) in &self.domains {
            let mut seen = BTreeSet::new();
            for agent in agents {
                if agent.trim().is_empty() {
                    return Err(RegistryError::EmptyAgentId {
                        domain: domain.clone(),
                    });
                }
                if !seen.insert(agent.as_str()) {
                    return Err(RegistryError::DuplicateAgent {
                        domain: domain.clone(),
                        agent: agent.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for CapabilityRegistry {
    /// Stock table matching the classifier's stock domains.
    fn default() -> Self {
        let table: &[(&str, &[&str])] = &[
            ("dns", &["dns_specialist", "cloud_security_principal"]),
            ("azure", &["azure_solutions_architect", "m365_administrator"]),
            (
                "security",
                &["cloud_security_principal", "azure_solutions_architect"],
            ),
            ("cloud", &["sre_principal_engineer", "azure_solutions_architect"]),
            ("financial", &["financial_advisor", "financial_planner"]),
            (
                "servicedesk",
                &["service_desk_manager", "sre_principal_engineer"],
            ),
            ("data", &["data_analyst", "financial_planner"]),
        ];
        let domains = table
            .iter()
            .map(|(domain, agents)| {
                (
                    (*domain).to_string(),
                    agents.iter().map(|a| (*a).to_string()).collect(),
                )
            })
            .collect();
        Self {
            domains,
            general_agent: default_general_agent(),
        }
    }
}
