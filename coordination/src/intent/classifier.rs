//! Keyword-driven intent classifier.
//!
//! All patterns are compiled once in [`IntentClassifier::new`]; `classify`
//! is a pure function of the query and the (immutable) configuration.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::entities::{extract_entities, Entities};
use super::{CategoryClarity, Intent, IntentCategory, GENERAL_DOMAIN};
use crate::config::{ConfigError, ConfigResult};

/// Keyword set for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPattern {
    pub name: String,
    pub keywords: Vec<String>,
}

impl DomainPattern {
    fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

/// Phrasing patterns for category assignment, checked in priority order:
/// strategic, analysis, operational (imperative start), else technical.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryPatterns {
    pub strategic: Vec<String>,
    pub analysis: Vec<String>,
    /// Verbs (or two-word phrases) that mark an imperative when they open the query.
    pub operational_verbs: Vec<String>,
}

impl Default for CategoryPatterns {
    fn default() -> Self {
        let owned = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect();
        Self {
            strategic: owned(&[
                "strategy",
                "strategic",
                "roadmap",
                "budget",
                "forecast",
                "investment",
                "roi",
                "business case",
                "financial plan",
                "long-term plan",
                "five year plan",
            ]),
            analysis: owned(&[
                "analyze",
                "analyse",
                "analysis",
                "compare",
                "comparison",
                "evaluate",
                "assess",
                "versus",
                "vs",
                "pros and cons",
            ]),
            operational_verbs: owned(&[
                "configure",
                "setup",
                "set up",
                "install",
                "deploy",
                "migrate",
                "create",
                "enable",
                "disable",
                "provision",
                "implement",
                "update",
                "add",
                "remove",
                "reset",
                "fix",
            ]),
        }
    }
}

/// Complexity increment for numeric entities at or above `min`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleTier {
    pub min: f64,
    pub increment: u8,
}

/// Complexity scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityWeights {
    pub base_general: u8,
    pub base_single_domain: u8,
    pub base_multi_domain: u8,
    /// Checked highest first; the first tier the largest number reaches applies.
    pub scale_tiers: Vec<ScaleTier>,
    pub urgency_markers: Vec<String>,
    pub urgency_increment: u8,
    pub integration_markers: Vec<String>,
    pub integration_increment: u8,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        let owned = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect();
        Self {
            base_general: 1,
            base_single_domain: 2,
            base_multi_domain: 3,
            scale_tiers: vec![
                ScaleTier {
                    min: 1000.0,
                    increment: 4,
                },
                ScaleTier {
                    min: 200.0,
                    increment: 3,
                },
                ScaleTier {
                    min: 50.0,
                    increment: 2,
                },
                ScaleTier {
                    min: 10.0,
                    increment: 1,
                },
            ],
            urgency_markers: owned(&["urgent", "asap", "immediately", "emergency", "critical"]),
            urgency_increment: 2,
            integration_markers: owned(&[
                "integrate",
                "integration",
                "migrate",
                "migration",
                "custom",
                "build",
                "automate",
                "hybrid",
                "multi-tenant",
            ]),
            integration_increment: 2,
        }
    }
}

/// Confidence scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub empty_query: f64,
    pub general: f64,
    pub single_domain: f64,
    pub per_extra_hit: f64,
    pub max_extra_hit_bonus: f64,
    pub multi_domain_leader: f64,
    pub multi_domain_tie: f64,
    pub clear_category_bonus: f64,
    pub ambiguous_category_penalty: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            empty_query: 0.2,
            general: 0.5,
            single_domain: 0.7,
            per_extra_hit: 0.05,
            max_extra_hit_bonus: 0.15,
            multi_domain_leader: 0.65,
            multi_domain_tie: 0.55,
            clear_category_bonus: 0.05,
            ambiguous_category_penalty: 0.10,
        }
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub domains: Vec<DomainPattern>,
    pub categories: CategoryPatterns,
    pub complexity: ComplexityWeights,
    pub confidence: ConfidenceWeights,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            domains: vec![
                DomainPattern::new(
                    "dns",
                    &[
                        "dns",
                        "spf",
                        "dkim",
                        "dmarc",
                        "mx record",
                        "txt record",
                        "cname",
                        "nameserver",
                        "name server",
                        "dns record",
                        "registrar",
                    ],
                ),
                DomainPattern::new(
                    "azure",
                    &[
                        "azure",
                        "exchange",
                        "office 365",
                        "o365",
                        "m365",
                        "microsoft 365",
                        "entra",
                        "active directory",
                        "intune",
                        "sharepoint",
                        "onedrive",
                        "microsoft teams",
                    ],
                ),
                DomainPattern::new(
                    "security",
                    &[
                        "security",
                        "vulnerability",
                        "threat",
                        "firewall",
                        "mfa",
                        "zero trust",
                        "penetration test",
                        "siem",
                        "compliance",
                        "phishing",
                    ],
                ),
                DomainPattern::new(
                    "cloud",
                    &[
                        "aws",
                        "gcp",
                        "kubernetes",
                        "k8s",
                        "terraform",
                        "docker",
                        "ec2",
                        "s3",
                        "lambda",
                        "cloud infrastructure",
                    ],
                ),
                DomainPattern::new(
                    "financial",
                    &[
                        "budget",
                        "financial",
                        "finance",
                        "investment",
                        "tax",
                        "cash flow",
                        "revenue",
                        "pricing",
                        "superannuation",
                        "mortgage",
                    ],
                ),
                DomainPattern::new(
                    "servicedesk",
                    &[
                        "ticket",
                        "service desk",
                        "helpdesk",
                        "help desk",
                        "sla",
                        "escalation",
                        "itsm",
                        "backlog",
                    ],
                ),
                DomainPattern::new(
                    "data",
                    &[
                        "sql",
                        "dashboard",
                        "dataset",
                        "etl",
                        "power bi",
                        "data pipeline",
                        "analytics",
                        "spreadsheet",
                    ],
                ),
            ],
            categories: CategoryPatterns::default(),
            complexity: ComplexityWeights::default(),
            confidence: ConfidenceWeights::default(),
        }
    }
}

/// A set of word-boundary keyword matchers.
#[derive(Debug, Clone)]
struct KeywordSet {
    matchers: Vec<Regex>,
}

impl KeywordSet {
    fn compile(keywords: &[String]) -> ConfigResult<Self> {
        let matchers = keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| {
                let pattern = format!(r"\b{}\b", regex::escape(&k.trim().to_lowercase()));
                Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: k.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self { matchers })
    }

    /// Number of distinct keywords present in `text` (already lower-cased).
    fn hits(&self, text: &str) -> u32 {
        self.matchers.iter().filter(|m| m.is_match(text)).count() as u32
    }

    fn any(&self, text: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(text))
    }
}

const QUESTION_OPENERS: &[&str] = &[
    "how", "what", "why", "when", "where", "which", "who", "can", "could", "is", "are", "does",
    "do", "should", "would",
];

/// Pure keyword-driven intent classifier.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    config: ClassifierConfig,
    domains: Vec<(String, KeywordSet)>,
    strategic: KeywordSet,
    analysis: KeywordSet,
    urgency: KeywordSet,
    integration: KeywordSet,
}

impl IntentClassifier {
    /// Compile the classifier's patterns.
    pub fn new(config: ClassifierConfig) -> ConfigResult<Self> {
        let mut domains = Vec::with_capacity(config.domains.len());
        for pattern in &config.domains {
            if pattern.name.trim().is_empty() || pattern.name == GENERAL_DOMAIN {
                return Err(ConfigError::Invalid {
                    field: "classifier.domains".to_string(),
                    message: format!("invalid domain name '{}'", pattern.name),
                });
            }
            domains.push((pattern.name.clone(), KeywordSet::compile(&pattern.keywords)?));
        }

        Ok(Self {
            strategic: KeywordSet::compile(&config.categories.strategic)?,
            analysis: KeywordSet::compile(&config.categories.analysis)?,
            urgency: KeywordSet::compile(&config.complexity.urgency_markers)?,
            integration: KeywordSet::compile(&config.complexity.integration_markers)?,
            domains,
            config,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Names of all configured domains.
    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|(name, _)| name.as_str())
    }

    /// Classify a raw query. Never fails.
    pub fn classify(&self, query: &str) -> Intent {
        let normalized = normalize(query);
        let entities = extract_entities(query);

        if normalized.is_empty() {
            return Intent {
                task_description: query.to_string(),
                domains: vec![GENERAL_DOMAIN.to_string()],
                domain_strengths: BTreeMap::new(),
                category: IntentCategory::TechnicalQuestion,
                category_clarity: CategoryClarity::Default,
                complexity: self.config.complexity.base_general.clamp(1, 10),
                entities,
                confidence: self.config.confidence.empty_query.clamp(0.0, 1.0),
            };
        }

        // ── Domains ───────────────────────────────────────────────────────────
        let mut ranked: Vec<(String, u32)> = self
            .domains
            .iter()
            .map(|(name, set)| (name.clone(), set.hits(&normalized)))
            .filter(|(_, hits)| *hits > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let domains: Vec<String> = if ranked.is_empty() {
            vec![GENERAL_DOMAIN.to_string()]
        } else {
            ranked.iter().map(|(name, _)| name.clone()).collect()
        };
        let domain_strengths: BTreeMap<String, u32> = ranked.iter().cloned().collect();

        let (category, category_clarity) = self.categorize(&normalized);
        let complexity = self.score_complexity(&normalized, ranked.len(), &entities);
        let confidence = self.score_confidence(&ranked, category_clarity);

        Intent {
            task_description: query.to_string(),
            domains,
            domain_strengths,
            category,
            category_clarity,
            complexity,
            entities,
            confidence,
        }
    }

    fn categorize(&self, text: &str) -> (IntentCategory, CategoryClarity) {
        let strategic = self.strategic.any(text);
        let analysis = self.analysis.any(text);
        let operational = self.is_imperative(text);
        let fired = [strategic, analysis, operational]
            .iter()
            .filter(|f| **f)
            .count();

        let category = if strategic {
            IntentCategory::StrategicPlanning
        } else if analysis {
            IntentCategory::AnalysisResearch
        } else if operational {
            IntentCategory::OperationalTask
        } else {
            IntentCategory::TechnicalQuestion
        };

        let clarity = match fired {
            0 if is_question(text) => CategoryClarity::Clear,
            0 => CategoryClarity::Default,
            1 => CategoryClarity::Clear,
            _ => CategoryClarity::Ambiguous,
        };

        (category, clarity)
    }

    fn is_imperative(&self, text: &str) -> bool {
        let head = text.strip_prefix("please ").unwrap_or(text);
        self.config.categories.operational_verbs.iter().any(|verb| {
            let verb = verb.trim().to_lowercase();
            !verb.is_empty()
                && head.starts_with(&verb)
                && head[verb.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric())
        })
    }

    fn score_complexity(&self, text: &str, domain_count: usize, entities: &Entities) -> u8 {
        let w = &self.config.complexity;
        let mut score: u32 = match domain_count {
            0 => w.base_general,
            1 => w.base_single_domain,
            _ => w.base_multi_domain,
        }
        .into();

        if let Some(max) = entities.max_number() {
            let mut tiers = w.scale_tiers.clone();
            tiers.sort_by(|a, b| b.min.total_cmp(&a.min));
            if let Some(tier) = tiers.iter().find(|t| max >= t.min) {
                score += u32::from(tier.increment);
            }
        }
        if self.urgency.any(text) {
            score += u32::from(w.urgency_increment);
        }
        if self.integration.any(text) {
            score += u32::from(w.integration_increment);
        }

        score.clamp(1, 10) as u8
    }

    fn score_confidence(&self, ranked: &[(String, u32)], clarity: CategoryClarity) -> f64 {
        let w = &self.config.confidence;
        let base = match ranked {
            [] => w.general,
            [(_, hits)] => {
                let extra = f64::from(hits.saturating_sub(1)) * w.per_extra_hit;
                w.single_domain + extra.min(w.max_extra_hit_bonus)
            }
            [(_, top), (_, second), ..] => {
                if top > second {
                    w.multi_domain_leader
                } else {
                    w.multi_domain_tie
                }
            }
        };
        let adjusted = match clarity {
            CategoryClarity::Clear => base + w.clear_category_bonus,
            CategoryClarity::Default => base,
            CategoryClarity::Ambiguous => base - w.ambiguous_category_penalty,
        };
        ((adjusted * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
    }
}

/// Lower-case, trim leading punctuation, collapse whitespace.
fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn is_question(text: &str) -> bool {
    if text.trim_end().ends_with('?') {
        return true;
    }
    let first = text.split_whitespace().next().unwrap_or("");
    QUESTION_OPENERS.contains(&first)
}
