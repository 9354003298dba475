//! Switchboard CLI
//!
//! ```bash
//! switchboard classify "How do I configure SPF records?"
//! switchboard route "Migrate 250 users to Exchange Online" --json
//! switchboard feedback 3f1c...e9 --accepted
//! switchboard swarm "Set up mail authentication for contoso.com"
//! switchboard analyze --days 7
//! switchboard experiment --baseline baseline.json --improved improved.json
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the default filter); results go
//! to stdout.

mod backend;
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use switchboard_coordination::quality::{samples_from_recorded, RecordedResponse};
use switchboard_coordination::{
    ABTestFramework, AccuracyAnalyzer, Coordinator, IntentClassifier, JsonlHistoryStore,
    SwarmEngine, SwarmResult, SwarmSession,
};
use tracing::info;
use uuid::Uuid;

use backend::HttpBackend;
use config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "switchboard=info,switchboard_coordination=info";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file (overrides SWITCHBOARD_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Routing history directory (overrides history_dir and SWITCHBOARD_HISTORY_DIR)
    #[arg(long, global = true)]
    history_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a query without routing it
    Classify {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        json: bool,
    },

    /// Route a query and record the decision
    Route {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        json: bool,
    },

    /// Record whether a routed answer was accepted
    #[command(group(ArgGroup::new("verdict").required(true).args(["accepted", "rejected"])))]
    Feedback {
        route_id: Uuid,
        #[arg(long)]
        accepted: bool,
        #[arg(long)]
        rejected: bool,
    },

    /// Record a manual routing override
    Override {
        override_type: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
    },

    /// Route a task and run it through the swarm engine
    Swarm {
        /// Task text; omit when using --tasks-file
        task: Vec<String>,
        /// Start at this agent instead of the routed one
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        max_handoffs: Option<usize>,
        #[arg(long)]
        hop_timeout_secs: Option<u64>,
        /// Run every non-empty line of this file as its own routed task
        #[arg(long, conflicts_with = "agent")]
        tasks_file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Report routing accuracy over the history store
    Analyze {
        /// Window in days (defaults to the analyzer summary window)
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },

    /// Compare two recorded response sets
    Experiment {
        #[arg(long)]
        baseline: PathBuf,
        #[arg(long)]
        improved: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.history_dir {
        config.history_dir = dir;
    }

    match cli.command {
        Command::Classify { query, json } => classify(&config, &query.join(" "), json),
        Command::Route { query, json } => route(&config, &query.join(" "), json),
        Command::Feedback {
            route_id, accepted, ..
        } => {
            let coordinator = coordinator(&config)?;
            coordinator
                .record_feedback(route_id, accepted)
                .with_context(|| format!("Failed to record feedback for {route_id}"))?;
            println!("recorded {} for {route_id}", if accepted { "accepted" } else { "rejected" });
            Ok(())
        }
        Command::Override {
            override_type,
            reason,
            confidence,
        } => {
            if !(0.0..=1.0).contains(&confidence) {
                bail!("--confidence must be between 0 and 1, got {confidence}");
            }
            coordinator(&config)?
                .record_override(&override_type, reason, confidence)
                .context("Failed to record override")?;
            println!("recorded override '{override_type}'");
            Ok(())
        }
        Command::Swarm {
            task,
            agent,
            max_handoffs,
            hop_timeout_secs,
            tasks_file,
            json,
        } => {
            if let Some(n) = max_handoffs {
                config.routing.swarm.max_handoffs = n;
            }
            if let Some(secs) = hop_timeout_secs {
                if secs == 0 {
                    bail!("--hop-timeout-secs must be positive");
                }
                config.routing.swarm.hop_timeout_secs = secs;
            }
            match tasks_file {
                Some(path) => swarm_batch(&config, &path, json).await,
                None => swarm(&config, &task.join(" "), agent.as_deref(), json).await,
            }
        }
        Command::Analyze { days, json } => analyze(&config, days, json),
        Command::Experiment {
            baseline,
            improved,
            json,
        } => experiment(&config, &baseline, &improved, json),
    }
}

fn coordinator(config: &AppConfig) -> Result<Coordinator> {
    let store = JsonlHistoryStore::open(&config.history_dir).with_context(|| {
        format!(
            "Failed to open history store {}",
            config.history_dir.display()
        )
    })?;
    let coordinator = Coordinator::from_config(
        &config.routing,
        Arc::new(config.registry()),
        Arc::new(store),
    )?;
    Ok(coordinator)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn classify(config: &AppConfig, query: &str, json: bool) -> Result<()> {
    let classifier = IntentClassifier::new(config.routing.classifier.clone())?;
    let intent = classifier.classify(query);
    if json {
        return print_json(&intent);
    }
    println!("{}", intent.summary());
    Ok(())
}

fn route(config: &AppConfig, query: &str, json: bool) -> Result<()> {
    let coordinator = coordinator(config)?;
    let (intent, decision) = coordinator.route_detailed(query)?;
    if json {
        return print_json(&serde_json::json!({ "intent": intent, "decision": decision }));
    }
    println!("{}", intent.summary());
    println!("{}", decision.summary());
    if let Some(id) = decision.route_id {
        println!("route id: {id}");
    }
    Ok(())
}

fn engine(config: &AppConfig) -> Result<SwarmEngine> {
    let registry = config.registry();
    let backend = HttpBackend::new(config.backend.clone()).context("Failed to build HTTP client")?;
    Ok(SwarmEngine::new(
        Arc::new(backend),
        Arc::new(config.template_store(&registry)),
        config.routing.swarm.clone(),
    ))
}

fn print_swarm(result: &SwarmResult) {
    println!("{}", result.summary());
    if let Some(reason) = &result.termination_reason {
        println!("terminated: {reason}");
    }
    for h in &result.handoff_chain {
        println!(
            "  #{} {} -> {}: {}",
            h.sequence_index, h.from_agent, h.to_agent, h.reason
        );
    }
    println!("\n{}", result.final_output);
}

async fn swarm(config: &AppConfig, task: &str, agent: Option<&str>, json: bool) -> Result<()> {
    if task.trim().is_empty() {
        bail!("swarm needs a task or --tasks-file");
    }
    let engine = engine(config)?;
    let mut session = SwarmSession::new();

    let result = match agent {
        Some(agent) => {
            engine
                .execute_swarm(agent, task, config.routing.swarm.max_handoffs, &mut session)
                .await
        }
        None => {
            let decision = coordinator(config)?.route(task)?;
            info!(route_id = ?decision.route_id, "{}", decision.summary());
            engine.execute_decision(&decision, task, &mut session).await
        }
    };

    if json {
        return print_json(&result);
    }
    print_swarm(&result);
    Ok(())
}

async fn swarm_batch(config: &AppConfig, path: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tasks file {}", path.display()))?;
    let coordinator = coordinator(config)?;
    let mut jobs = Vec::new();
    for task in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        jobs.push((coordinator.route(task)?, task.to_string()));
    }
    if jobs.is_empty() {
        bail!("{} contains no tasks", path.display());
    }

    let results = engine(config)?.execute_batch(&jobs).await;
    if json {
        return print_json(&results);
    }
    for ((_, task), result) in jobs.iter().zip(&results) {
        println!("== {task}");
        print_swarm(result);
        println!();
    }
    Ok(())
}

fn analyze(config: &AppConfig, days: Option<u32>, json: bool) -> Result<()> {
    let analyzer = AccuracyAnalyzer::open(&config.history_dir, config.routing.analyzer.clone())
        .with_context(|| {
            format!(
                "No routing history at {}",
                config.history_dir.display()
            )
        })?;
    let days = days.unwrap_or(config.routing.analyzer.summary_window_days);
    let report = analyzer.analyze_accuracy(days)?;
    if json {
        return print_json(&report);
    }
    print!("{}", report.render_text());
    Ok(())
}

fn load_recorded(path: &Path) -> Result<Vec<RecordedResponse>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn experiment(config: &AppConfig, baseline: &Path, improved: &Path, json: bool) -> Result<()> {
    let baseline = samples_from_recorded(load_recorded(baseline)?).context("Invalid baseline")?;
    let improved = samples_from_recorded(load_recorded(improved)?).context("Invalid improved")?;
    let result = ABTestFramework::new(config.routing.experiment.clone())
        .run_experiment(&baseline, &improved)?;
    if json {
        return print_json(&result);
    }
    print!("{}", result.summary());
    Ok(())
}
