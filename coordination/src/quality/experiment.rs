//! Paired A/B experiment over rubric-scored responses.
//!
//! Both arms must hold the same number of samples. Completion rates are
//! compared with a pooled two-proportion z-test; the p-value is reported as
//! the upper bound of its band:
//!
//! ```text
//! |z| > 2.58  -> 0.01
//! |z| > 1.96  -> 0.05
//! |z| > 1.65  -> 0.10
//! otherwise   -> 0.20
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::rubric::{Grade, QualityScore, ResponseSignals};

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Sample count mismatch: baseline has {baseline}, improved has {improved}")]
    SampleCountMismatch { baseline: usize, improved: usize },

    #[error("Experiment needs at least one sample per arm")]
    EmptySample,

    #[error("Invalid sample #{index}: {message}")]
    InvalidSample { index: usize, message: String },
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;

/// Decision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Score lift (percent) above which a significant result deploys.
    pub deploy_lift_pct: f64,
    /// Score lift (percent) above which a significant result is worth refining.
    pub refine_lift_pct: f64,
    pub alpha: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            deploy_lift_pct: 15.0,
            refine_lift_pct: 10.0,
            alpha: 0.05,
        }
    }
}

/// One scored response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSample {
    pub score: QualityScore,
    pub completed: bool,
    pub latency_ms: u64,
}

impl ExperimentSample {
    pub fn new(score: QualityScore, completed: bool, latency_ms: u64) -> Self {
        Self {
            score,
            completed,
            latency_ms,
        }
    }

    /// Score from signals; a fully resolved response counts as completed.
    pub fn from_signals(signals: &ResponseSignals, latency_ms: u64) -> Self {
        Self::new(
            QualityScore::from_signals(signals),
            signals.fully_resolved,
            latency_ms,
        )
    }
}

/// Pre-scored component points, as recorded by a grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPoints {
    pub task_completion: u8,
    pub tool_calling: u8,
    pub problem_decomposition: u8,
    pub response_quality: u8,
    pub persistence: u8,
}

/// A recorded response transcript entry. Carries either raw `signals` or
/// grader `scores`; `signals` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub signals: Option<ResponseSignals>,
    #[serde(default)]
    pub scores: Option<ComponentPoints>,
    /// Defaults to `signals.fully_resolved`, or false for score-only entries.
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl RecordedResponse {
    pub fn into_sample(self, index: usize) -> ExperimentResult<ExperimentSample> {
        let (score, resolved) = match (self.signals, self.scores) {
            (Some(signals), _) => (QualityScore::from_signals(&signals), signals.fully_resolved),
            (None, Some(p)) => (
                QualityScore::from_components(
                    p.task_completion,
                    p.tool_calling,
                    p.problem_decomposition,
                    p.response_quality,
                    p.persistence,
                ),
                false,
            ),
            (None, None) => {
                return Err(ExperimentError::InvalidSample {
                    index,
                    message: format!(
                        "{} has neither signals nor scores",
                        self.id.as_deref().unwrap_or("response")
                    ),
                })
            }
        };
        Ok(ExperimentSample::new(
            score,
            self.completed.unwrap_or(resolved),
            self.latency_ms,
        ))
    }
}

/// Convert a transcript into samples, failing on the first invalid entry.
pub fn samples_from_recorded(
    recorded: Vec<RecordedResponse>,
) -> ExperimentResult<Vec<ExperimentSample>> {
    recorded
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_sample(i))
        .collect()
}

/// Aggregates for one experiment arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmSummary {
    pub samples: usize,
    pub mean_score: f64,
    pub completion_rate: f64,
    pub completed: usize,
    pub mean_latency_ms: f64,
    pub mean_task_completion: f64,
    pub mean_tool_calling: f64,
    pub mean_problem_decomposition: f64,
    pub mean_response_quality: f64,
    pub mean_persistence: f64,
    pub grade_distribution: BTreeMap<Grade, usize>,
}

impl ArmSummary {
    pub fn from_samples(samples: &[ExperimentSample]) -> Self {
        let n = samples.len();
        let mean = |f: &dyn Fn(&ExperimentSample) -> f64| {
            if n == 0 {
                0.0
            } else {
                samples.iter().map(f).sum::<f64>() / n as f64
            }
        };

        let completed = samples.iter().filter(|s| s.completed).count();
        let mut grade_distribution = BTreeMap::new();
        for s in samples {
            *grade_distribution.entry(s.score.grade).or_insert(0) += 1;
        }

        Self {
            samples: n,
            mean_score: mean(&|s| f64::from(s.score.total)),
            completion_rate: if n == 0 {
                0.0
            } else {
                completed as f64 / n as f64
            },
            completed,
            mean_latency_ms: mean(&|s| s.latency_ms as f64),
            mean_task_completion: mean(&|s| f64::from(s.score.task_completion)),
            mean_tool_calling: mean(&|s| f64::from(s.score.tool_calling)),
            mean_problem_decomposition: mean(&|s| f64::from(s.score.problem_decomposition)),
            mean_response_quality: mean(&|s| f64::from(s.score.response_quality)),
            mean_persistence: mean(&|s| f64::from(s.score.persistence)),
            grade_distribution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployRecommendation {
    Deploy,
    Refine,
    Reject,
}

impl fmt::Display for DeployRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "deploy"),
            Self::Refine => write!(f, "refine"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ABTestResult {
    pub baseline: ArmSummary,
    pub improved: ArmSummary,
    /// Mean score lift relative to baseline, percent.
    pub score_delta_pct: f64,
    pub completion_delta_pct: f64,
    /// Negative means the improved arm is faster.
    pub latency_delta_pct: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub significant: bool,
    pub recommendation: DeployRecommendation,
    pub rationale: String,
}

impl ABTestResult {
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("A/B Quality Experiment\n");
        out.push_str(&format!(
            "{:<18} {:>10} {:>10} {:>9}\n",
            "metric", "baseline", "improved", "delta"
        ));
        out.push_str(&format!(
            "{:<18} {:>10.1} {:>10.1} {:>+8.1}%\n",
            "mean score", self.baseline.mean_score, self.improved.mean_score, self.score_delta_pct
        ));
        out.push_str(&format!(
            "{:<18} {:>9.1}% {:>9.1}% {:>+8.1}%\n",
            "completion",
            self.baseline.completion_rate * 100.0,
            self.improved.completion_rate * 100.0,
            self.completion_delta_pct
        ));
        out.push_str(&format!(
            "{:<18} {:>10.0} {:>10.0} {:>+8.1}%\n",
            "latency ms",
            self.baseline.mean_latency_ms,
            self.improved.mean_latency_ms,
            self.latency_delta_pct
        ));
        out.push_str(&format!(
            "samples per arm: {}  z = {:.3}  p <= {:.2}  significant: {}\n",
            self.baseline.samples, self.z_score, self.p_value, self.significant
        ));
        out.push_str(&format!(
            "recommendation: {} ({})\n",
            self.recommendation, self.rationale
        ));
        out
    }
}

/// Runs paired experiments under a fixed [`ExperimentConfig`].
#[derive(Debug, Clone, Default)]
pub struct ABTestFramework {
    config: ExperimentConfig,
}

impl ABTestFramework {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn run_experiment(
        &self,
        baseline: &[ExperimentSample],
        improved: &[ExperimentSample],
    ) -> ExperimentResult<ABTestResult> {
        if baseline.len() != improved.len() {
            return Err(ExperimentError::SampleCountMismatch {
                baseline: baseline.len(),
                improved: improved.len(),
            });
        }
        if baseline.is_empty() {
            return Err(ExperimentError::EmptySample);
        }

        let base = ArmSummary::from_samples(baseline);
        let imp = ArmSummary::from_samples(improved);

        let score_delta_pct = pct_delta(base.mean_score, imp.mean_score);
        let completion_delta_pct = pct_delta(base.completion_rate, imp.completion_rate);
        let latency_delta_pct = pct_delta(base.mean_latency_ms, imp.mean_latency_ms);

        let z_score = pooled_z(base.completed, imp.completed, baseline.len());
        let p_value = banded_p_value(z_score);
        let significant = p_value <= self.config.alpha;
        let (recommendation, rationale) = self.recommend(score_delta_pct, significant);

        info!(
            samples = baseline.len(),
            score_delta_pct,
            z_score,
            p_value,
            %recommendation,
            "A/B experiment complete"
        );

        Ok(ABTestResult {
            baseline: base,
            improved: imp,
            score_delta_pct,
            completion_delta_pct,
            latency_delta_pct,
            z_score,
            p_value,
            significant,
            recommendation,
            rationale,
        })
    }

    fn recommend(&self, lift: f64, significant: bool) -> (DeployRecommendation, String) {
        let deploy = self.config.deploy_lift_pct;
        let refine = self.config.refine_lift_pct;

        if lift > deploy && significant {
            (
                DeployRecommendation::Deploy,
                format!("{lift:.1}% score lift exceeds {deploy}% and completion gain is significant"),
            )
        } else if lift > deploy {
            (
                DeployRecommendation::Refine,
                format!("{lift:.1}% score lift but completion gain is not significant; collect more samples"),
            )
        } else if lift > refine && significant {
            (
                DeployRecommendation::Refine,
                format!("{lift:.1}% score lift is between {refine}% and {deploy}%"),
            )
        } else if lift <= 0.0 {
            (
                DeployRecommendation::Reject,
                format!("no improvement ({lift:+.1}% score change)"),
            )
        } else {
            (
                DeployRecommendation::Reject,
                format!("{lift:.1}% score lift is insufficient"),
            )
        }
    }
}

/// Percentage change from `base` to `new`. A zero baseline counts any gain
/// as +100%.
fn pct_delta(base: f64, new: f64) -> f64 {
    if base == 0.0 {
        if new > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (new - base) / base * 100.0
    }
}

/// Two-proportion z-score with a pooled proportion, equal arm sizes.
fn pooled_z(baseline_successes: usize, improved_successes: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let p1 = baseline_successes as f64 / n;
    let p2 = improved_successes as f64 / n;
    let pooled = (baseline_successes + improved_successes) as f64 / (2.0 * n);
    let se = (pooled * (1.0 - pooled) * (2.0 / n)).sqrt();
    if se == 0.0 {
        0.0
    } else {
        (p2 - p1) / se
    }
}

fn banded_p_value(z: f64) -> f64 {
    let z = z.abs();
    if z > 2.58 {
        0.01
    } else if z > 1.96 {
        0.05
    } else if z > 1.65 {
        0.10
    } else {
        0.20
    }
}
