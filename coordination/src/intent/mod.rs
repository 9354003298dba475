//! Intent Classification
//!
//! Turns a raw query into a structured [`Intent`]: which domains it touches,
//! what kind of request it is, how complex it looks, which entities it names,
//! and how confident the classification is.
//!
//! ```text
//! "Migrate 250 users to Exchange Online"
//!      │
//!      ├─ domains     keyword sets per domain       → ["azure"]
//!      ├─ category    priority-ordered phrasing     → operational_task
//!      ├─ complexity  base + scale/urgency/integration  → 7
//!      ├─ entities    emails, FQDNs, numbers        → numbers=[250 users]
//!      └─ confidence  domain count/strength, category clarity → 0.75
//! ```
//!
//! Classification never fails. The worst case is a low-confidence intent in
//! the `general` domain.

pub mod classifier;
pub mod entities;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use classifier::{
    CategoryPatterns, ClassifierConfig, ComplexityWeights, ConfidenceWeights, DomainPattern,
    IntentClassifier, ScaleTier,
};
pub use entities::{extract_entities, Entities, NumericEntity};

/// Fallback domain when no configured domain matches.
pub const GENERAL_DOMAIN: &str = "general";

/// Request category, assigned by priority-ordered phrasing patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    TechnicalQuestion,
    OperationalTask,
    AnalysisResearch,
    StrategicPlanning,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TechnicalQuestion => "technical_question",
            Self::OperationalTask => "operational_task",
            Self::AnalysisResearch => "analysis_research",
            Self::StrategicPlanning => "strategic_planning",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How decisively the category was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryClarity {
    /// Exactly one category pattern group fired, or none fired and the
    /// query is question-shaped.
    Clear,
    /// Nothing fired; the category is the default.
    Default,
    /// Two or more pattern groups fired; the highest priority won.
    Ambiguous,
}

/// Structured interpretation of a raw query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// The raw query as given.
    pub task_description: String,
    /// Matched domains, strongest first. Never empty.
    pub domains: Vec<String>,
    /// Distinct keyword hits per matched domain.
    #[serde(default)]
    pub domain_strengths: BTreeMap<String, u32>,
    pub category: IntentCategory,
    pub category_clarity: CategoryClarity,
    /// 1–10
    pub complexity: u8,
    pub entities: Entities,
    /// 0.0–1.0
    pub confidence: f64,
}

impl Intent {
    /// Whether nothing but the fallback domain matched.
    pub fn is_general(&self) -> bool {
        self.domains.len() == 1 && self.domains[0] == GENERAL_DOMAIN
    }

    /// Strongest matched domain.
    pub fn primary_domain(&self) -> &str {
        self.domains
            .first()
            .map(String::as_str)
            .unwrap_or(GENERAL_DOMAIN)
    }

    /// Compact summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "domains=[{}] category={} complexity={}/10 confidence={:.2}",
            self.domains.join(","),
            self.category,
            self.complexity,
            self.confidence
        )
    }
}
