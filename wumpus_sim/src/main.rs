//! Wumpus simulator CLI
//!
//! Plays scripted agents against a live session under a virtual clock and
//! checks the game's lifecycle guarantees.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wumpus_core::SessionConfig;
use wumpus_sim::scenarios::ScenarioId;
use wumpus_sim::{ScenarioResult, ScenarioRunner, SimConfig};

#[derive(Parser, Debug)]
#[command(name = "wumpus-sim")]
#[command(about = "Deterministic simulation of multiplayer wumpus sessions")]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of simulated agents
    #[arg(short, long, default_value = "4")]
    agents: usize,

    /// Scenario to run (random_walk, gold_rush, early_stop, reset_mid_game, disconnect, observer_churn, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Turns per run; overrides the session config
    #[arg(short, long)]
    turns: Option<u32>,

    /// Turn window in milliseconds; overrides the session config
    #[arg(long)]
    turn_time_ms: Option<u64>,

    /// JSON file with the session config (world, turns, policies)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the spectator frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn load_session_config(args: &Args) -> Result<SessionConfig, String> {
    let mut session = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            SessionConfig::from_json(&text).map_err(|e| e.to_string())?
        }
        None => SessionConfig::default(),
    };
    if let Some(turns) = args.turns {
        session.turns.run_turns = turns;
    }
    if let Some(ms) = args.turn_time_ms {
        session.turns.turn_time_ms = ms;
    }
    session.validate().map_err(|e| e.to_string())?;
    Ok(session)
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {err}");
    }

    if !args.json {
        info!("Wumpus Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!(
                "Available scenarios: random_walk, gold_rush, early_stop, reset_mid_game, disconnect, observer_churn, all"
            );
            std::process::exit(1);
        })]
    };

    let session = load_session_config(&args).unwrap_or_else(|e| {
        eprintln!("Error: invalid session config: {}", e);
        std::process::exit(1);
    });

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let runner_for = |seed: u64| {
        ScenarioRunner::from_config(SimConfig {
            seed,
            num_agents: args.agents,
            session: session.clone(),
        })
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        info!("Running with export to: {}", export_path);
        let (result, export) = runner_for(base_seed).run_with_export(scenarios[0]);
        if let Err(err) = export.write_to_file(export_path) {
            error!("Failed to write {}: {}", export_path, err);
            std::process::exit(1);
        }

        if result.passed {
            info!(
                "✓ {} (seed={}) PASSED - {} frames exported to {}",
                scenarios[0].name(),
                base_seed,
                export.frames.len(),
                export_path
            );
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = runner_for(seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED  turns={} actions={} best={} virtual={}ms",
                        scenario.name(),
                        seed,
                        result.metrics.turns_started,
                        result.metrics.actions,
                        result.metrics.best_score,
                        result.metrics.virtual_time_ms
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "turnTime": session.turns.turn_time_ms,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(err) => error!("Failed to encode summary: {}", err),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
