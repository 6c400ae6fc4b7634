// KTUNE DAEMON
// Wires configuration, the node client, a decision provider and the k controller, then runs
// control cycles until Ctrl-C.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ktune_controller::{
    ControllerConfig, DecisionProvider, HeuristicPolicy, KController, NodeNotifier, RemotePolicy,
};
use ktune_core::KtuneConfig;
use ktune_rpc::{ClientConfig, DagClient, DagRpc};
use ktune_sim::DagSimulator;

#[derive(Parser)]
#[command(name = "ktune")]
#[command(about = "Adaptive k-parameter tuner for a blue/red block-DAG node", long_about = None)]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    rpc_host: Option<String>,

    #[arg(long)]
    rpc_port: Option<u16>,

    /// Pause between control cycles
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Node process to signal with SIGUSR1 after a committed change
    #[arg(long)]
    node_pid: Option<i32>,

    #[arg(long, value_enum, default_value_t = PolicyKind::Heuristic)]
    policy: PolicyKind,

    /// HTTP inference endpoint for `--policy remote`
    #[arg(long)]
    policy_endpoint: Option<String>,

    /// Read metrics from the in-process dynamics model instead of the node
    #[arg(long)]
    simulate: bool,

    /// With --simulate, never contact the node and apply k changes locally
    #[arg(long, requires = "simulate")]
    offline: bool,

    /// Seed for the dynamics model
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    Heuristic,
    Remote,
}

fn load_config(args: &Args) -> Result<KtuneConfig> {
    let mut config = KtuneConfig::load(args.config.as_deref()).context("loading configuration")?;

    if let Some(host) = &args.rpc_host {
        config.rpc_host = host.clone();
    }
    if let Some(port) = args.rpc_port {
        config.rpc_port = port;
    }
    if let Some(interval) = args.interval_ms {
        config.poll_interval_ms = interval;
    }
    if args.node_pid.is_some() {
        config.node_pid = args.node_pid;
    }
    if args.policy_endpoint.is_some() {
        config.policy_endpoint = args.policy_endpoint.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate().context("validating configuration")?;
    Ok(config)
}

async fn build_provider(
    kind: PolicyKind,
    config: &KtuneConfig,
) -> Result<Arc<dyn DecisionProvider>> {
    let provider: Arc<dyn DecisionProvider> = match kind {
        PolicyKind::Heuristic => Arc::new(HeuristicPolicy::default()),
        PolicyKind::Remote => {
            let Some(endpoint) = &config.policy_endpoint else {
                bail!("--policy remote needs --policy-endpoint or policy_endpoint in config");
            };
            Arc::new(RemotePolicy::new(endpoint.clone(), config.rpc_timeout())?)
        }
    };

    provider
        .probe()
        .await
        .with_context(|| format!("decision provider '{}' is not ready", provider.name()))?;
    Ok(provider)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let provider = build_provider(args.policy, &config).await?;

    let client: Arc<dyn DagRpc> = Arc::new(DagClient::new(ClientConfig::from_config(&config)));
    let notifier = NodeNotifier::new(config.node_pid);
    let controller_config = ControllerConfig::from_config(&config);

    let mut controller = if args.simulate {
        let sim = match config.seed {
            Some(seed) => DagSimulator::with_seed(config.initial_k, seed),
            None => DagSimulator::from_entropy(config.initial_k),
        };
        let authority = if args.offline { None } else { Some(client) };
        KController::simulated(controller_config, provider, sim, authority, notifier)
    } else {
        KController::live(controller_config, provider, client, notifier)
    };

    info!(
        node = %format!("{}:{}", config.rpc_host, config.rpc_port),
        simulate = args.simulate,
        offline = args.offline,
        provider = controller.provider_name(),
        "ktune starting"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(e) => error!(error = %e, "cannot listen for Ctrl+C, shutting down"),
        }
        let _ = stop_tx.send(true);
    });

    controller.run(stop_rx).await;

    let confidence = controller.confidence();
    info!(
        k = controller.current_k(),
        decisions = confidence.decisions,
        changes = confidence.committed_changes,
        mean_confidence = confidence.rolling_mean.unwrap_or(0.0),
        "ktune stopped"
    );
    Ok(())
}
