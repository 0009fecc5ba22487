use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fleet_core::app::{EngineConfig, FleetEngine, TrendReport};
use fleet_core::environment::load_environment;
use fleet_core::impls::{
    FileAnalyst, JsonFileHistoryStore, JsonFileTallyStore, RetryingAnalyst, StaticAnalyst,
};
use fleet_core::ports::{FailureAnalyst, HistoryStore};

const NO_ANALYSIS: &str = "No failure analysis available.";

#[derive(Parser, Debug)]
#[command(name = "fleet", about = "Buy / sell / hold decisions for a server fleet", version)]
struct Cli {
    /// Directory holding history and action tallies
    #[arg(long, global = true, env = "FLEET_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate the fleet and append the decisions to history
    Run(RunArgs),
    /// Summarize past cycles
    Trends,
    /// Print the most recent history records as JSON
    History(HistoryArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Consecutive cycles in this run (the in-run cooldown spans them)
    #[arg(long, env = "FLEET_CYCLES")]
    cycles: Option<u32>,
    /// Seed for a reproducible run
    #[arg(long, env = "FLEET_SEED")]
    seed: Option<u64>,
    #[arg(long, env = "FLEET_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Report written by the external failure analysis
    #[arg(long, env = "FLEET_ANALYSIS_FILE")]
    analysis_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[arg(long, default_value_t = 5)]
    last: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env は clap が環境変数を読む前に反映する
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env().context("reading FLEET_* configuration")?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    match cli.command {
        Commands::Run(args) => {
            if let Some(cycles) = args.cycles {
                config.cycles = cycles;
            }
            if args.seed.is_some() {
                config.seed = args.seed;
            }
            if let Some(dir) = args.data_dir {
                config.data_dir = dir;
            }
            if args.analysis_file.is_some() {
                config.analysis_file = args.analysis_file;
            }
            run(config).await
        }
        Commands::Trends => trends(config).await,
        Commands::History(args) => history(config, args.last).await,
    }
}

async fn run(config: EngineConfig) -> Result<()> {
    info!(?config, "starting run");

    let loaded = load_environment(&config.data_paths())
        .await
        .with_context(|| format!("loading inputs from {}", config.data_dir.display()))?;
    if loaded.state.servers().is_empty() {
        warn!("no servers in the demand input; nothing to decide");
    }

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let analyst: Arc<dyn FailureAnalyst> = match config.analysis_path() {
        Some(path) => Arc::new(RetryingAnalyst::new(FileAnalyst::new(path))),
        None => Arc::new(StaticAnalyst::new(NO_ANALYSIS)),
    };
    let mut engine = FleetEngine::new(
        Arc::new(JsonFileHistoryStore::new(config.history_path())),
        Arc::new(JsonFileTallyStore::new(config.tally_path())),
        analyst,
        rng,
    )
    .with_cooldown_cycles(config.cooldown_cycles)
    .with_fatigue_window(config.fatigue_window);

    let outcomes = engine
        .run(&loaded.state, config.cycles)
        .await
        .with_context(|| format!("recording to {}", config.history_path().display()))?;

    let Some(last) = outcomes.last() else {
        println!("No cycles were run.");
        return Ok(());
    };
    println!("Optimized server actions:");
    for (id, action) in last.actions() {
        let raw = last.raw_actions.get(id).copied().unwrap_or(*action);
        if raw == *action {
            println!("    - {id}: {action}");
        } else {
            println!("    - {id}: {action} (raw {raw}, recently sold)");
        }
    }
    for err in outcomes.iter().flat_map(|o| &o.policy_errors) {
        println!("    ! {err}");
    }
    println!("\nFailure analysis:\n{}", last.record.ai_failure_analysis);
    println!(
        "\nResults appended to {} ({} cycle{})",
        config.history_path().display(),
        outcomes.len(),
        if outcomes.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

async fn trends(config: EngineConfig) -> Result<()> {
    let store = JsonFileHistoryStore::new(config.history_path());
    let records = store
        .all()
        .await
        .with_context(|| format!("reading {}", store.path().display()))?;
    let report = TrendReport::from_history(&records).context("compiling trend patterns")?;
    println!("{report}");
    Ok(())
}

async fn history(config: EngineConfig, last: usize) -> Result<()> {
    let store = JsonFileHistoryStore::new(config.history_path());
    let records = store
        .recent(last)
        .await
        .with_context(|| format!("reading {}", store.path().display()))?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
