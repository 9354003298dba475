//! Integration tests for the Accuracy Analyzer
//!
//! Seeds a JSONL history store with routes and feedback at fixed offsets
//! from a reference time, then checks windows, grouping, patterns and
//! recommendations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use switchboard_coordination::analytics::{
    AccuracyAnalyzer, AnalyzerConfig, Grouping, RecommendationKind, Severity,
};
use switchboard_coordination::history::{FeedbackRecord, HistoryStore};
use switchboard_coordination::{
    AnalyticsError, HistoryError, IntentCategory, JsonlHistoryStore, MemoryHistoryStore,
    OverrideRecord, RouteRecord, RoutingStrategy,
};
use uuid::Uuid;

struct Seed {
    category: IntentCategory,
    strategy: RoutingStrategy,
    complexity: u8,
    confidence: f64,
    days_ago: i64,
    accepted: usize,
    rejected: usize,
    pending: usize,
}

fn record(seed: &Seed, now: DateTime<Utc>) -> RouteRecord {
    RouteRecord {
        id: Uuid::new_v4(),
        timestamp: now - Duration::days(seed.days_ago),
        query_category: seed.category,
        query_complexity: seed.complexity,
        routing_strategy: seed.strategy,
        confidence: seed.confidence,
        initial_agent: "dns_specialist".into(),
        agents: vec!["dns_specialist".into()],
        accepted: None,
    }
}

fn seed_store(store: &dyn HistoryStore, seeds: &[Seed], now: DateTime<Utc>) {
    for seed in seeds {
        let outcomes = std::iter::repeat(Some(true))
            .take(seed.accepted)
            .chain(std::iter::repeat(Some(false)).take(seed.rejected))
            .chain(std::iter::repeat(None).take(seed.pending));
        for outcome in outcomes {
            let route = record(seed, now);
            store.append_route(&route).unwrap();
            if let Some(accepted) = outcome {
                store
                    .append_feedback(&FeedbackRecord::new(route.id, accepted))
                    .unwrap();
            }
        }
    }
}

/// Technical questions do well, strategic swarms do badly, a small analysis
/// group and some stale rows sit below the thresholds.
fn mixed_history() -> Vec<Seed> {
    vec![
        Seed {
            category: IntentCategory::TechnicalQuestion,
            strategy: RoutingStrategy::SingleAgent,
            complexity: 2,
            confidence: 0.75,
            days_ago: 1,
            accepted: 9,
            rejected: 1,
            pending: 2,
        },
        Seed {
            category: IntentCategory::StrategicPlanning,
            strategy: RoutingStrategy::Swarm,
            complexity: 8,
            confidence: 0.85,
            days_ago: 2,
            accepted: 3,
            rejected: 7,
            pending: 0,
        },
        Seed {
            category: IntentCategory::AnalysisResearch,
            strategy: RoutingStrategy::SingleAgent,
            complexity: 5,
            confidence: 0.6,
            days_ago: 3,
            accepted: 0,
            rejected: 3,
            pending: 0,
        },
        Seed {
            category: IntentCategory::OperationalTask,
            strategy: RoutingStrategy::SingleAgent,
            complexity: 4,
            confidence: 0.7,
            days_ago: 40,
            accepted: 0,
            rejected: 6,
            pending: 0,
        },
    ]
}

fn analyzer_over(seeds: &[Seed]) -> (tempfile::TempDir, AccuracyAnalyzer) {
    let temp = tempfile::TempDir::new().unwrap();
    let now = Utc::now();
    let store = JsonlHistoryStore::open(temp.path()).unwrap();
    seed_store(&store, seeds, now);
    let analyzer = AccuracyAnalyzer::open(temp.path(), AnalyzerConfig::default())
        .unwrap()
        .with_reference_time(now);
    (temp, analyzer)
}

/// Test: Overall accuracy excludes pending routes and stale rows
#[test]
fn test_overall_accuracy_window() {
    let (_temp, analyzer) = analyzer_over(&mixed_history());

    let week = analyzer.get_overall_accuracy(7).unwrap();
    assert_eq!(week.total, 25);
    assert_eq!(week.pending, 2);
    assert_eq!(week.accepted, 12);
    assert_eq!(week.rejected, 11);
    assert!((week.acceptance_rate - 12.0 / 23.0).abs() < 1e-9);

    let longer = analyzer.get_overall_accuracy(60).unwrap();
    assert_eq!(longer.total, 31);
    assert_eq!(longer.rejected, 17);
}

/// Test: Breakdown by category, complexity bucket and strategy
#[test]
fn test_breakdowns() {
    let (_temp, analyzer) = analyzer_over(&mixed_history());

    let by_category = analyzer.get_accuracy_by_category(7).unwrap();
    assert_eq!(by_category["technical_question"].acceptance_rate, 0.9);
    assert_eq!(by_category["strategic_planning"].acceptance_rate, 0.3);
    assert!(!by_category.contains_key("operational_task"));

    let by_complexity = analyzer.get_accuracy_by_complexity_bucket(7).unwrap();
    assert_eq!(by_complexity["simple"].total, 12);
    assert_eq!(by_complexity["medium"].total, 3);
    assert_eq!(by_complexity["complex"].total, 10);

    let by_strategy = analyzer.get_accuracy_by_strategy(7).unwrap();
    assert_eq!(by_strategy["single_agent"].evaluated(), 13);
    assert_eq!(by_strategy["swarm"].evaluated(), 10);
}

/// Test: Patterns respect the sample floor and rank by severity
#[test]
fn test_low_accuracy_patterns() {
    let (_temp, analyzer) = analyzer_over(&mixed_history());
    let patterns = analyzer.identify_low_accuracy_patterns(0.7, 5).unwrap();

    // strategic_planning, complex and swarm at 30%; single_agent at 9/13.
    assert_eq!(patterns.len(), 4);
    for p in &patterns[..3] {
        assert_eq!(p.severity, Severity::Critical);
        assert_eq!(p.sample_size, 10);
        assert!(p.recommendation.contains("mismatched"), "{}", p.recommendation);
    }
    let last = &patterns[3];
    assert_eq!(last.grouping, Grouping::Strategy);
    assert_eq!(last.group, "single_agent");
    assert_eq!(last.severity, Severity::Low);

    // The three-route analysis group never qualifies.
    assert!(patterns.iter().all(|p| p.group != "analysis_research"));
    assert!(analyzer
        .identify_low_accuracy_patterns(0.7, 11)
        .unwrap()
        .iter()
        .all(|p| p.sample_size >= 11));
}

/// Test: Threshold outside [0,1] is rejected
#[test]
fn test_invalid_threshold() {
    let (_temp, analyzer) = analyzer_over(&[]);
    let err = analyzer.identify_low_accuracy_patterns(1.5, 5).unwrap_err();
    assert!(matches!(
        err,
        AnalyticsError::InvalidArgument {
            name: "threshold",
            ..
        }
    ));
}

/// Test: Recommendations lead with the most severe findings
#[test]
fn test_recommendations_ordered_by_severity() {
    let (_temp, analyzer) = analyzer_over(&mixed_history());
    let recs = analyzer.generate_recommendations(7).unwrap();

    assert_eq!(recs.len(), 4);
    assert!(recs[..3]
        .iter()
        .all(|r| r.kind == RecommendationKind::LowAccuracyPattern
            && r.severity == Severity::Critical));
    assert_eq!(recs[3].kind, RecommendationKind::OverallAccuracy);
    assert_eq!(recs[3].severity, Severity::High);
    assert!(recs
        .windows(2)
        .all(|pair| pair[0].severity >= pair[1].severity));
}

/// Test: High confidence with poor acceptance is flagged as overconfidence
#[test]
fn test_overconfidence_detected() {
    let now = Utc::now();
    let store = MemoryHistoryStore::new();
    seed_store(
        &store,
        &[Seed {
            category: IntentCategory::TechnicalQuestion,
            strategy: RoutingStrategy::SingleAgent,
            complexity: 2,
            confidence: 0.9,
            days_ago: 1,
            accepted: 6,
            rejected: 4,
            pending: 0,
        }],
        now,
    );
    let analyzer = AccuracyAnalyzer::new(Arc::new(store), AnalyzerConfig::default())
        .with_reference_time(now);
    let recs = analyzer.generate_recommendations(7).unwrap();
    assert!(recs
        .iter()
        .any(|r| r.kind == RecommendationKind::Overconfidence));
}

/// Test: Healthy routing yields no recommendations
#[test]
fn test_healthy_history_has_no_recommendations() {
    let (_temp, analyzer) = analyzer_over(&[Seed {
        category: IntentCategory::TechnicalQuestion,
        strategy: RoutingStrategy::SingleAgent,
        complexity: 2,
        confidence: 0.75,
        days_ago: 1,
        accepted: 19,
        rejected: 1,
        pending: 0,
    }]);
    let report = analyzer.analyze_accuracy(7).unwrap();
    assert!(report.recommendations.is_empty());
    assert!(report.patterns.is_empty());
    assert!(report.render_text().contains("none, routing is within targets"));
}

/// Test: Full report carries overrides and renders every section
#[test]
fn test_analyze_accuracy_report() {
    let (temp, analyzer) = analyzer_over(&mixed_history());
    let store = JsonlHistoryStore::open_existing(temp.path()).unwrap();
    for (kind, reason, conf) in [
        ("manual_agent", Some("wrong specialist"), 0.5),
        ("manual_agent", Some("wrong specialist"), 0.6),
        ("force_swarm", None, 0.7),
    ] {
        store
            .append_override(&OverrideRecord::new(kind, reason.map(String::from), conf))
            .unwrap();
    }

    let report = analyzer.analyze_accuracy(7).unwrap();
    assert_eq!(report.window_days, 7);
    assert_eq!(report.overall.total, 25);
    assert_eq!(report.patterns.len(), 4);
    assert_eq!(report.overrides.total, 3);
    assert_eq!(report.overrides.by_type["manual_agent"], 2);
    assert_eq!(
        report.overrides.top_reasons,
        vec![("wrong specialist".to_string(), 2)]
    );
    assert!((report.overrides.avg_confidence - 0.6).abs() < 1e-9);

    let text = report.render_text();
    assert!(text.contains("By category:"));
    assert!(text.contains("Low-accuracy patterns:"));
    assert!(text.contains("Overrides: 3"));
    assert!(text.contains("[critical]"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["overall"]["accepted"], 12);
}

/// Test: Missing store fails fast
#[test]
fn test_missing_store_is_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let missing = temp.path().join("nope");
    let err = AccuracyAnalyzer::open(&missing, AnalyzerConfig::default())
        .err()
        .expect("missing store must fail");
    assert!(matches!(
        err,
        AnalyticsError::Store(HistoryError::StoreNotFound { .. })
    ));
}

/// Test: Analyzing an empty store directory leaves it untouched
#[test]
fn test_analyzer_creates_no_files() {
    let temp = tempfile::TempDir::new().unwrap();
    let analyzer = AccuracyAnalyzer::open(temp.path(), AnalyzerConfig::default()).unwrap();

    let report = analyzer.analyze_accuracy(7).unwrap();
    assert_eq!(report.overall.total, 0);
    assert_eq!(report.overall.acceptance_rate, 0.0);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}
