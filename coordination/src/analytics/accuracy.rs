//! Accuracy analyzer over the routing history store.
//!
//! Acceptance rate is `accepted / (accepted + rejected)`; routes still
//! waiting for feedback are counted as `pending` and excluded from the rate.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{AnalyticsError, AnalyticsResult};
use crate::history::{HistoryStore, JsonlHistoryStore, OverrideRecord, RouteRecord};

/// Analyzer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Overall acceptance below this triggers a recommendation.
    pub acceptance_target: f64,
    /// Groups below this acceptance rate are flagged as patterns.
    pub pattern_threshold: f64,
    /// Minimum evaluated routes for a group to be flagged.
    pub min_pattern_sample: usize,
    /// Evaluated routes needed before a pattern can be critical.
    pub critical_min_sample: usize,
    pub overconfidence_confidence: f64,
    pub overconfidence_acceptance: f64,
    /// Pattern templates: below this average confidence, refine classification.
    pub low_confidence: f64,
    /// Pattern templates: at or above this, the agents are mismatched.
    pub high_confidence: f64,
    pub max_pattern_recommendations: usize,
    pub summary_window_days: u32,
    pub pattern_window_days: u32,
    /// Most common override reasons listed in the summary.
    pub top_override_reasons: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            acceptance_target: 0.80,
            pattern_threshold: 0.70,
            min_pattern_sample: 5,
            critical_min_sample: 10,
            overconfidence_confidence: 0.80,
            overconfidence_acceptance: 0.70,
            low_confidence: 0.60,
            high_confidence: 0.80,
            max_pattern_recommendations: 3,
            summary_window_days: 7,
            pattern_window_days: 30,
            top_override_reasons: 5,
        }
    }
}

/// Acceptance metrics for a set of routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
    /// accepted / (accepted + rejected); 0 when nothing is evaluated.
    pub acceptance_rate: f64,
    /// Over all routes in the set, pending included.
    pub avg_confidence: f64,
    pub avg_complexity: f64,
}

impl AccuracyStats {
    pub fn from_routes<'a>(routes: impl IntoIterator<Item = &'a RouteRecord>) -> Self {
        let mut stats = Self::default();
        let mut confidence = 0.0;
        let mut complexity = 0.0;
        for route in routes {
            stats.total += 1;
            match route.accepted {
                Some(true) => stats.accepted += 1,
                Some(false) => stats.rejected += 1,
                None => stats.pending += 1,
            }
            confidence += route.confidence;
            complexity += f64::from(route.query_complexity);
        }
        if stats.total > 0 {
            stats.avg_confidence = confidence / stats.total as f64;
            stats.avg_complexity = complexity / stats.total as f64;
        }
        let evaluated = stats.evaluated();
        if evaluated > 0 {
            stats.acceptance_rate = stats.accepted as f64 / evaluated as f64;
        }
        stats
    }

    pub fn evaluated(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Fixed complexity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    /// 1-3
    Simple,
    /// 4-6
    Medium,
    /// 7-10
    Complex,
}

impl ComplexityBucket {
    pub fn from_complexity(complexity: u8) -> Self {
        match complexity {
            0..=3 => Self::Simple,
            4..=6 => Self::Medium,
            _ => Self::Complex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }
}

/// Which dimension a group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Category,
    ComplexityBucket,
    Strategy,
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::ComplexityBucket => write!(f, "complexity"),
            Self::Strategy => write!(f, "strategy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A group whose acceptance rate is below the pattern threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowAccuracyPattern {
    pub grouping: Grouping,
    pub group: String,
    /// Evaluated routes in the group.
    pub sample_size: usize,
    pub acceptance_rate: f64,
    pub avg_confidence: f64,
    pub severity: Severity,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    OverallAccuracy,
    LowAccuracyPattern,
    Overconfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub message: String,
}

/// Manual override activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSummary {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub avg_confidence: f64,
    /// Most common reasons, count descending then reason.
    pub top_reasons: Vec<(String, usize)>,
}

/// Everything the analyzer knows about one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub overall: AccuracyStats,
    pub by_category: BTreeMap<String, AccuracyStats>,
    pub by_complexity: BTreeMap<String, AccuracyStats>,
    pub by_strategy: BTreeMap<String, AccuracyStats>,
    pub patterns: Vec<LowAccuracyPattern>,
    pub recommendations: Vec<Recommendation>,
    pub overrides: OverrideSummary,
}

fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

impl AccuracyReport {
    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let o = &self.overall;
        out.push_str(&format!(
            "Routing accuracy, last {} days (generated {})\n",
            self.window_days,
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(&format!(
            "  routes={} accepted={} rejected={} pending={} acceptance={} avg_confidence={:.2} avg_complexity={:.1}\n",
            o.total,
            o.accepted,
            o.rejected,
            o.pending,
            pct(o.acceptance_rate),
            o.avg_confidence,
            o.avg_complexity
        ));

        for (title, groups) in [
            ("By category", &self.by_category),
            ("By complexity", &self.by_complexity),
            ("By strategy", &self.by_strategy),
        ] {
            if groups.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{title}:\n"));
            for (group, stats) in groups {
                out.push_str(&format!(
                    "  {group:<20} n={:<4} evaluated={:<4} acceptance={}\n",
                    stats.total,
                    stats.evaluated(),
                    pct(stats.acceptance_rate)
                ));
            }
        }

        if !self.patterns.is_empty() {
            out.push_str("\nLow-accuracy patterns:\n");
            for p in &self.patterns {
                out.push_str(&format!(
                    "  [{}] {} '{}' acceptance={} n={}\n",
                    p.severity,
                    p.grouping,
                    p.group,
                    pct(p.acceptance_rate),
                    p.sample_size
                ));
            }
        }

        if self.overrides.total > 0 {
            out.push_str(&format!(
                "\nOverrides: {} (avg confidence {:.2})\n",
                self.overrides.total, self.overrides.avg_confidence
            ));
            for (kind, count) in &self.overrides.by_type {
                out.push_str(&format!("  {kind}: {count}\n"));
            }
        }

        out.push_str("\nRecommendations:\n");
        if self.recommendations.is_empty() {
            out.push_str("  none, routing is within targets\n");
        }
        for r in &self.recommendations {
            out.push_str(&format!("  [{}] {}\n", r.severity, r.message));
        }
        out
    }
}

/// Read-only accuracy analyzer.
pub struct AccuracyAnalyzer {
    store: Arc<dyn HistoryStore>,
    config: AnalyzerConfig,
    reference_time: Option<DateTime<Utc>>,
}

impl AccuracyAnalyzer {
    pub fn new(store: Arc<dyn HistoryStore>, config: AnalyzerConfig) -> Self {
        Self {
            store,
            config,
            reference_time: None,
        }
    }

    /// Open the JSONL store in `dir`, failing fast when it does not exist.
    pub fn open(dir: impl AsRef<Path>, config: AnalyzerConfig) -> AnalyticsResult<Self> {
        let store = JsonlHistoryStore::open_existing(dir)?;
        Ok(Self::new(Arc::new(store), config))
    }

    /// Evaluate windows relative to `now` instead of the wall clock.
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn since(&self, days: u32) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now) - Duration::days(i64::from(days))
    }

    fn routes(&self, days: u32) -> AnalyticsResult<Vec<RouteRecord>> {
        let routes = self.store.load_routes(Some(self.since(days)))?;
        debug!(days, routes = routes.len(), "Loaded routes for analysis");
        Ok(routes)
    }

    pub fn get_overall_accuracy(&self, days: u32) -> AnalyticsResult<AccuracyStats> {
        Ok(AccuracyStats::from_routes(&self.routes(days)?))
    }

    pub fn get_accuracy_by_category(
        &self,
        days: u32,
    ) -> AnalyticsResult<BTreeMap<String, AccuracyStats>> {
        Ok(group_by(&self.routes(days)?, Grouping::Category))
    }

    pub fn get_accuracy_by_complexity_bucket(
        &self,
        days: u32,
    ) -> AnalyticsResult<BTreeMap<String, AccuracyStats>> {
        Ok(group_by(&self.routes(days)?, Grouping::ComplexityBucket))
    }

    pub fn get_accuracy_by_strategy(
        &self,
        days: u32,
    ) -> AnalyticsResult<BTreeMap<String, AccuracyStats>> {
        Ok(group_by(&self.routes(days)?, Grouping::Strategy))
    }

    /// Flag groups over the pattern window with at least `min_sample_size`
    /// evaluated routes and an acceptance rate below `threshold`. Most severe
    /// first, then lowest rate.
    pub fn identify_low_accuracy_patterns(
        &self,
        threshold: f64,
        min_sample_size: usize,
    ) -> AnalyticsResult<Vec<LowAccuracyPattern>> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalyticsError::InvalidArgument {
                name: "threshold",
                message: format!("{threshold} is outside 0.0-1.0"),
            });
        }
        let routes = self.routes(self.config.pattern_window_days)?;
        Ok(self.patterns_in(&routes, threshold, min_sample_size))
    }

    fn patterns_in(
        &self,
        routes: &[RouteRecord],
        threshold: f64,
        min_sample_size: usize,
    ) -> Vec<LowAccuracyPattern> {
        let mut patterns = Vec::new();
        for grouping in [
            Grouping::Category,
            Grouping::ComplexityBucket,
            Grouping::Strategy,
        ] {
            for (group, stats) in group_by(routes, grouping) {
                let n = stats.evaluated();
                if n == 0 || n < min_sample_size || stats.acceptance_rate >= threshold {
                    continue;
                }
                let severity = self.pattern_severity(stats.acceptance_rate, n);
                patterns.push(LowAccuracyPattern {
                    recommendation: self.pattern_recommendation(grouping, &group, &stats),
                    grouping,
                    group,
                    sample_size: n,
                    acceptance_rate: stats.acceptance_rate,
                    avg_confidence: stats.avg_confidence,
                    severity,
                });
            }
        }
        patterns.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.acceptance_rate.total_cmp(&b.acceptance_rate))
        });
        patterns
    }

    fn pattern_severity(&self, rate: f64, n: usize) -> Severity {
        if rate < 0.40 && n >= self.config.critical_min_sample {
            Severity::Critical
        } else if rate < 0.50 {
            Severity::High
        } else if rate < 0.60 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn pattern_recommendation(&self, grouping: Grouping, group: &str, stats: &AccuracyStats) -> String {
        let rate = pct(stats.acceptance_rate);
        let conf = stats.avg_confidence;
        if conf < self.config.low_confidence {
            return format!(
                "Refine intent classification for {grouping} '{group}': average confidence {conf:.2} with {rate} acceptance; extend domain keywords or category patterns"
            );
        }
        if conf >= self.config.high_confidence {
            return format!(
                "Agents mismatched to expectation for {grouping} '{group}': confident routing (avg {conf:.2}) but only {rate} accepted; review the ranked agents or their prompts"
            );
        }
        match grouping {
            Grouping::Category => format!(
                "Review which domains and agents '{group}' requests map to ({rate} accepted)"
            ),
            Grouping::ComplexityBucket => format!(
                "Revisit the swarm complexity threshold for {group} queries ({rate} accepted)"
            ),
            Grouping::Strategy if group == "single_agent" => format!(
                "Single-agent routes are accepted {rate} of the time; consider routing borderline queries to a swarm"
            ),
            Grouping::Strategy => format!(
                "Swarm routes are accepted {rate} of the time; review swarm composition and handoff prompts"
            ),
        }
    }

    /// Overall, pattern and overconfidence recommendations, most severe first.
    pub fn generate_recommendations(&self, days: u32) -> AnalyticsResult<Vec<Recommendation>> {
        let overall = self.get_overall_accuracy(days)?;
        let patterns = self.identify_low_accuracy_patterns(
            self.config.pattern_threshold,
            self.config.min_pattern_sample,
        )?;
        Ok(self.recommendations_for(&overall, &patterns))
    }

    fn recommendations_for(
        &self,
        overall: &AccuracyStats,
        patterns: &[LowAccuracyPattern],
    ) -> Vec<Recommendation> {
        let mut recs = Vec::new();
        let evaluated = overall.evaluated() > 0;
        let rate = overall.acceptance_rate;

        if evaluated && rate < self.config.acceptance_target {
            let severity = if rate < 0.5 {
                Severity::Critical
            } else if rate < 0.6 {
                Severity::High
            } else if rate < 0.7 {
                Severity::Medium
            } else {
                Severity::Low
            };
            recs.push(Recommendation {
                kind: RecommendationKind::OverallAccuracy,
                severity,
                message: format!(
                    "Overall acceptance {} is below the {} target across {} evaluated routes",
                    pct(rate),
                    pct(self.config.acceptance_target),
                    overall.evaluated()
                ),
            });
        }

        recs.extend(
            patterns
                .iter()
                .take(self.config.max_pattern_recommendations)
                .map(|p| Recommendation {
                    kind: RecommendationKind::LowAccuracyPattern,
                    severity: p.severity,
                    message: p.recommendation.clone(),
                }),
        );

        if evaluated
            && overall.avg_confidence > self.config.overconfidence_confidence
            && rate < self.config.overconfidence_acceptance
        {
            recs.push(Recommendation {
                kind: RecommendationKind::Overconfidence,
                severity: Severity::High,
                message: format!(
                    "Classifier is overconfident: average confidence {:.2} but only {} accepted; lower confidence weights or raise the single-agent threshold",
                    overall.avg_confidence,
                    pct(rate)
                ),
            });
        }

        recs.sort_by(|a, b| b.severity.cmp(&a.severity));
        recs
    }

    pub fn get_override_summary(&self, days: u32) -> AnalyticsResult<OverrideSummary> {
        let rows = self.store.load_overrides(Some(self.since(days)))?;
        Ok(summarize_overrides(&rows, self.config.top_override_reasons))
    }

    /// Full report over `days`; patterns use the pattern window.
    pub fn analyze_accuracy(&self, days: u32) -> AnalyticsResult<AccuracyReport> {
        let routes = self.routes(days)?;
        let pattern_routes = if days == self.config.pattern_window_days {
            routes.clone()
        } else {
            self.routes(self.config.pattern_window_days)?
        };
        let overall = AccuracyStats::from_routes(&routes);
        let patterns = self.patterns_in(
            &pattern_routes,
            self.config.pattern_threshold,
            self.config.min_pattern_sample,
        );
        let recommendations = self.recommendations_for(&overall, &patterns);

        Ok(AccuracyReport {
            generated_at: self.reference_time.unwrap_or_else(Utc::now),
            window_days: days,
            by_category: group_by(&routes, Grouping::Category),
            by_complexity: group_by(&routes, Grouping::ComplexityBucket),
            by_strategy: group_by(&routes, Grouping::Strategy),
            overall,
            patterns,
            recommendations,
            overrides: self.get_override_summary(days)?,
        })
    }
}

fn group_key(route: &RouteRecord, grouping: Grouping) -> String {
    match grouping {
        Grouping::Category => route.query_category.as_str().to_string(),
        Grouping::ComplexityBucket => ComplexityBucket::from_complexity(route.query_complexity)
            .as_str()
            .to_string(),
        Grouping::Strategy => route.routing_strategy.as_str().to_string(),
    }
}

fn group_by(routes: &[RouteRecord], grouping: Grouping) -> BTreeMap<String, AccuracyStats> {
    let mut groups: BTreeMap<String, Vec<&RouteRecord>> = BTreeMap::new();
    for route in routes {
        groups.entry(group_key(route, grouping)).or_default().push(route);
    }
    groups
        .into_iter()
        .map(|(key, members)| (key, AccuracyStats::from_routes(members)))
        .collect()
}

fn summarize_overrides(rows: &[OverrideRecord], top: usize) -> OverrideSummary {
    let mut summary = OverrideSummary {
        total: rows.len(),
        ..OverrideSummary::default()
    };
    if rows.is_empty() {
        return summary;
    }
    let mut reasons: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *summary.by_type.entry(row.override_type.clone()).or_insert(0) += 1;
        if let Some(reason) = row.override_reason.as_deref().map(str::trim) {
            if !reason.is_empty() {
                *reasons.entry(reason).or_insert(0) += 1;
            }
        }
    }
    summary.avg_confidence = rows.iter().map(|r| r.confidence).sum::<f64>() / rows.len() as f64;
    let mut ranked: Vec<(String, usize)> = reasons
        .into_iter()
        .map(|(reason, count)| (reason.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top);
    summary.top_reasons = ranked;
    summary
}
