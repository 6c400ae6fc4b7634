use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ktune_controller::HeuristicPolicy;
use ktune_core::{KAction, KtuneConfig};
use ktune_rpc::{submit_with_fallback, ClientConfig, DagClient, DagRpc};
use ktune_sim::{DagSimulator, EnvConfig, GhostDagEnv};

#[derive(Parser)]
#[command(name = "ktune-cli")]
#[command(about = "Query a DAG node and exercise the k tuner", long_about = None)]
struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    rpc_host: Option<String>,

    #[arg(long, global = true)]
    rpc_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node agent status: k, confidence, coloring counters
    Health,

    /// Current DAG tips with blue scores
    Tips,

    /// Last N linearized blocks
    Snapshot {
        #[arg(long, default_value_t = 50)]
        n: usize,
    },

    /// Full total ordering of the DAG
    TipOrder,

    /// Blocks with blue score in [from, to]
    Range {
        #[arg(long)]
        from: u64,
        #[arg(long)]
        to: u64,
    },

    /// Hot-swap the node's k
    UpdateK { k: u64 },

    /// Submit a transaction on the bluest tips
    Submit {
        /// Hex-encoded payload
        payload: String,

        #[arg(long, default_value_t = 3)]
        parent_count: usize,
    },

    /// Run an offline episode on the dynamics model
    Simulate {
        /// Episode length (defaults to max_steps from config)
        #[arg(long)]
        steps: Option<u64>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = SimPolicy::Heuristic)]
        policy: SimPolicy,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SimPolicy {
    Heuristic,
    Hold,
}

/// Steps between progress lines during `simulate`.
const STATUS_EVERY: u64 = 50;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<KtuneConfig> {
    let mut config = KtuneConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(host) = &cli.rpc_host {
        config.rpc_host = host.clone();
    }
    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }
    Ok(config)
}

fn simulate(
    config: &KtuneConfig,
    steps: Option<u64>,
    seed: Option<u64>,
    policy: SimPolicy,
) -> Result<()> {
    let env_config = EnvConfig {
        max_steps: steps.unwrap_or(config.max_steps),
        ..EnvConfig::from_config(config)
    };
    if env_config.max_steps == 0 {
        bail!("an episode needs at least one step");
    }

    let sim = match seed.or(config.seed) {
        Some(seed) => DagSimulator::with_seed(env_config.initial_k, seed),
        None => DagSimulator::from_entropy(env_config.initial_k),
    };
    let mut env = GhostDagEnv::new(env_config, sim);
    let heuristic = HeuristicPolicy::default();

    let (mut observation, _) = env.reset();
    loop {
        let action = match policy {
            SimPolicy::Heuristic => heuristic.evaluate(&observation).action,
            SimPolicy::Hold => KAction::Hold,
        };
        let outcome = env.step(action);
        observation = outcome.observation;

        if env.current_step() % STATUS_EVERY == 0 {
            info!("{}", env.status_line());
        }
        if outcome.truncated {
            break;
        }
    }

    print_json(&env.summary())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = DagClient::new(ClientConfig::from_config(&config));

    match cli.command {
        Commands::Health => print_json(&client.get_health().await?),
        Commands::Tips => print_json(&client.get_tips().await?),
        Commands::Snapshot { n } => print_json(&client.get_snapshot(n).await?),
        Commands::TipOrder => print_json(&client.get_tip_order().await?),
        Commands::Range { from, to } => {
            if from > to {
                bail!("--from ({from}) must not exceed --to ({to})");
            }
            print_json(&client.linearize_range(from, to).await?)
        }
        Commands::UpdateK { k } => {
            let bounds = config.k_bounds();
            if bounds.clamp(k) != k {
                bail!("k={k} outside [{}, {}]", bounds.k_min, bounds.k_max);
            }
            let ack = client.update_k(k).await?;
            info!(k, "node acknowledged new k");
            print_json(&ack)
        }
        Commands::Submit {
            payload,
            parent_count,
        } => print_json(&submit_with_fallback(&client, &payload, parent_count).await?),
        Commands::Simulate {
            steps,
            seed,
            policy,
        } => simulate(&config, steps, seed, policy),
    }
}
