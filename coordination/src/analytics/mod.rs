//! Routing accuracy analytics.
//!
//! Read-only metrics over the routing history: acceptance rates overall and
//! per category, complexity bucket and strategy, low-accuracy pattern
//! detection and templated tuning recommendations.

pub mod accuracy;
pub mod error;

pub use accuracy::{
    AccuracyAnalyzer, AccuracyReport, AccuracyStats, AnalyzerConfig, ComplexityBucket, Grouping,
    LowAccuracyPattern, OverrideSummary, Recommendation, RecommendationKind, Severity,
};
pub use error::{AnalyticsError, AnalyticsResult};
