use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use switchboard_coordination::registry::CapabilityRegistry;
use switchboard_coordination::swarm::StaticTemplateStore;
use switchboard_coordination::RoutingConfig;

/// OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub model: String,
    /// Name of the environment variable holding the API key, if any.
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/v1/chat/completions".into(),
            model: "default".into(),
            api_key_env: None,
            max_tokens: 2048,
            temperature: 0.3,
        }
    }
}

impl BackendConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Top-level CLI configuration file.
///
/// ```toml
/// history_dir = "/var/lib/switchboard"
///
/// [routing.selector]
/// swarm_penalty = 0.85
///
/// [backend]
/// url = "http://localhost:8000/v1/chat/completions"
/// model = "qwen2.5-32b-instruct"
/// api_key_env = "SWITCHBOARD_API_KEY"
///
/// [registry.domains]
/// dns = ["dns_specialist", "cloud_security_principal"]
///
/// [templates]
/// dns_specialist = "You are a DNS specialist.\n\n## Task\n{{task}}"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub history_dir: PathBuf,
    pub routing: RoutingConfig,
    pub backend: BackendConfig,
    /// Replaces the built-in registry when present.
    pub registry: Option<CapabilityRegistry>,
    /// Per-agent prompt templates; other registry agents get the default.
    pub templates: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_dir: PathBuf::from("switchboard-history"),
            routing: RoutingConfig::default(),
            backend: BackendConfig::default(),
            registry: None,
            templates: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (or `SWITCHBOARD_CONFIG`), then apply environment
    /// overrides and validate. Without a file the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SWITCHBOARD_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Environment overrides; unparsable routing values keep their current
    /// setting.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.routing.apply_overrides(&lookup);
        if let Some(dir) = lookup("SWITCHBOARD_HISTORY_DIR").filter(|v| !v.trim().is_empty()) {
            self.history_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("SWITCHBOARD_BACKEND_URL").filter(|v| !v.trim().is_empty()) {
            self.backend.url = url;
        }
        if let Some(model) = lookup("SWITCHBOARD_BACKEND_MODEL").filter(|v| !v.trim().is_empty()) {
            self.backend.model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.routing.validate().context("Invalid routing configuration")?;
        if let Some(registry) = &self.registry {
            registry.validate().context("Invalid [registry] table")?;
        }
        Ok(())
    }

    pub fn registry(&self) -> CapabilityRegistry {
        self.registry.clone().unwrap_or_default()
    }

    /// Templates from `[templates]` plus the default for every other
    /// registry agent.
    pub fn template_store(&self, registry: &CapabilityRegistry) -> StaticTemplateStore {
        let mut store = StaticTemplateStore::new();
        for (agent, template) in &self.templates {
            store.insert(agent.clone(), template.clone());
        }
        for agent in registry.all_agents() {
            store.register(agent);
        }
        store
    }
}
