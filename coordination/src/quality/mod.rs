//! A/B quality validation for agent variants.
//!
//! [`rubric`] turns observed response signals into a 100-point
//! [`QualityScore`]; [`experiment`] compares two equally sized arms of scored
//! responses and recommends deploy, refine or reject.

pub mod experiment;
pub mod rubric;

pub use experiment::{
    samples_from_recorded, ABTestFramework, ABTestResult, ArmSummary, ComponentPoints,
    DeployRecommendation, ExperimentConfig, ExperimentError, ExperimentResult, ExperimentSample,
    RecordedResponse,
};
pub use rubric::{
    Grade, QualityScore, ResponseSignals, PERSISTENCE_MAX, PROBLEM_DECOMPOSITION_MAX,
    RESPONSE_QUALITY_MAX, TASK_COMPLETION_MAX, TOOL_CALLING_MAX,
};
