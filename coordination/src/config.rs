//! Routing configuration.
//!
//! Every tunable constant of the pipeline lives in one of the per-module
//! config structs aggregated by [`RoutingConfig`]. Each struct has a
//! `Default` carrying the stock values, so a TOML file only needs to name
//! what it changes:
//!
//! ```toml
//! [selector]
//! swarm_penalty = 0.9
//!
//! [swarm]
//! max_handoffs = 3
//! ```
//!
//! After the file is read, `SWITCHBOARD_*` environment variables are applied
//! on top. Env values are parsed leniently: a value that does not parse (or
//! is out of range) is ignored and the file/default value stays.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analytics::AnalyzerConfig;
use crate::intent::ClassifierConfig;
use crate::quality::ExperimentConfig;
use crate::router::SelectorConfig;
use crate::swarm::SwarmConfig;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A keyword or pattern did not compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Aggregated pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub classifier: ClassifierConfig,
    pub selector: SelectorConfig,
    pub swarm: SwarmConfig,
    pub analyzer: AnalyzerConfig,
    pub experiment: ExperimentConfig,
}

impl RoutingConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text, path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `SWITCHBOARD_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// - `SWITCHBOARD_SWARM_PENALTY`: 0.0-1.0 (default 0.85)
    /// - `SWITCHBOARD_GENERAL_PENALTY`: 0.0-1.0 (default 0.8)
    /// - `SWITCHBOARD_SINGLE_AGENT_MIN_CONFIDENCE`: 0.0-1.0 (default 0.6)
    /// - `SWITCHBOARD_SWARM_COMPLEXITY_THRESHOLD`: 1-10 (default 7)
    /// - `SWITCHBOARD_MAX_SWARM_AGENTS`: >= 2 (default 4)
    /// - `SWITCHBOARD_MAX_HANDOFFS`: >= 0 (default 5)
    /// - `SWITCHBOARD_HOP_TIMEOUT_SECS`: > 0 (default 60)
    /// - `SWITCHBOARD_ACCEPTANCE_TARGET`: 0.0-1.0 (default 0.80)
    /// - `SWITCHBOARD_PATTERN_WINDOW_DAYS`: > 0 (default 30)
    /// - `SWITCHBOARD_DEPLOY_LIFT`: percent (default 15)
    /// - `SWITCHBOARD_ALPHA`: 0.0-1.0 (default 0.05)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let unit = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| (0.0..=1.0).contains(v))
        };

        if let Some(v) = unit("SWITCHBOARD_SWARM_PENALTY") {
            self.selector.swarm_penalty = v;
        }
        if let Some(v) = unit("SWITCHBOARD_GENERAL_PENALTY") {
            self.selector.general_penalty = v;
        }
        if let Some(v) = unit("SWITCHBOARD_SINGLE_AGENT_MIN_CONFIDENCE") {
            self.selector.single_agent_min_confidence = v;
        }
        if let Some(v) = lookup("SWITCHBOARD_SWARM_COMPLEXITY_THRESHOLD")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|v| (1..=10).contains(v))
        {
            self.selector.swarm_complexity_threshold = v;
        }
        if let Some(v) = lookup("SWITCHBOARD_MAX_SWARM_AGENTS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v >= 2)
        {
            self.selector.max_swarm_agents = v;
        }
        if let Some(v) =
            lookup("SWITCHBOARD_MAX_HANDOFFS").and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.swarm.max_handoffs = v;
        }
        if let Some(v) = lookup("SWITCHBOARD_HOP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            self.swarm.hop_timeout_secs = v;
        }
        if let Some(v) = unit("SWITCHBOARD_ACCEPTANCE_TARGET") {
            self.analyzer.acceptance_target = v;
        }
        if let Some(v) = lookup("SWITCHBOARD_PATTERN_WINDOW_DAYS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v > 0)
        {
            self.analyzer.pattern_window_days = v;
        }
        if let Some(v) = lookup("SWITCHBOARD_DEPLOY_LIFT")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
        {
            self.experiment.deploy_lift_pct = v;
        }
        if let Some(v) = unit("SWITCHBOARD_ALPHA") {
            self.experiment.alpha = v;
        }
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> ConfigResult<()> {
        let s = &self.selector;
        for (field, value) in [
            ("selector.swarm_penalty", s.swarm_penalty),
            ("selector.general_penalty", s.general_penalty),
            (
                "selector.single_agent_min_confidence",
                s.single_agent_min_confidence,
            ),
            ("experiment.alpha", self.experiment.alpha),
            ("analyzer.acceptance_target", self.analyzer.acceptance_target),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    message: format!("{value} is outside 0.0-1.0"),
                });
            }
        }
        if s.max_swarm_agents < 2 {
            return Err(ConfigError::Invalid {
                field: "selector.max_swarm_agents".to_string(),
                message: format!("{} is below 2", s.max_swarm_agents),
            });
        }
        if self.swarm.hop_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "swarm.hop_timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.experiment.refine_lift_pct > self.experiment.deploy_lift_pct {
            return Err(ConfigError::Invalid {
                field: "experiment.refine_lift_pct".to_string(),
                message: "must not exceed deploy_lift_pct".to_string(),
            });
        }
        Ok(())
    }
}
