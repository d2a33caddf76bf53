//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "binary"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Binary entrypoint for the OEE simulator daemon."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use oee_api::{spawn_api_server, ApiServer, ApiState};
use oee_common::config::{AppConfig, BrokerKind};
use oee_common::logging::init_tracing;
use oee_core::{CellRegistry, RuntimeOptions, SimulationRuntime};
use oee_metrics::{new_registry, spawn_http_server, DaemonMetrics, SimulationMetrics};
use oee_msg::{ChannelPublisher, LoggingPublisher, NatsForwarder, TelemetryPublisher};
use oee_persistence::JsonlSnapshotLog;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const SERVICE_NAME: &str = "oee-simd";
const DEFAULT_CONFIG_PATH: &str = "configs/oee-sim.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Production-cell OEE simulator daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Override the number of simulated cells")]
    cells: Option<usize>,

    #[arg(long, value_name = "SEED", help = "Override the random seed")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the simulator")]
    Run,
    #[command(about = "Validate the configuration and print the effective settings")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG_PATH));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    let load_duration = load_started.elapsed();

    if let Some(cells) = cli.cells {
        config.plant.cell_count = cells;
    }
    if let Some(seed) = cli.seed {
        config.simulation.random_seed = seed;
    }
    config.validate().context("configuration invalid after CLI overrides")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_tracing(SERVICE_NAME, &config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            run_daemon(config, load_duration.as_secs_f64()).await?
        }
        Commands::CheckConfig => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            println!("# source: {}\n{rendered}", loaded.source.display());
        }
    }

    Ok(())
}

async fn run_daemon(config: AppConfig, load_seconds: f64) -> Result<()> {
    let metrics_registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(metrics_registry.clone())?;
    daemon_metrics.observe_config_load(load_seconds);
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(
        env!("CARGO_PKG_VERSION"),
        if cfg!(debug_assertions) { "debug" } else { "release" },
    );
    let simulation_metrics = SimulationMetrics::new(metrics_registry.clone())?;

    let metrics_server = if config.metrics.enabled {
        info!(address = %config.metrics.listen, "metrics exporter enabled");
        Some(spawn_http_server(metrics_registry, config.metrics.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let (publisher, queue): (Arc<dyn TelemetryPublisher>, _) = match config.telemetry.broker {
        BrokerKind::None => {
            info!("no broker configured; telemetry is logged only");
            (Arc::new(LoggingPublisher), None)
        }
        BrokerKind::Nats => {
            let (publisher, queue) = ChannelPublisher::bounded(config.telemetry.queue_capacity);
            (Arc::new(publisher), Some(queue))
        }
    };

    let registry = Arc::new(
        CellRegistry::initialize(&config, publisher, Utc::now())
            .with_metrics(simulation_metrics.clone()),
    );

    let mut runtime = SimulationRuntime::new(registry.clone(), RuntimeOptions::from_config(&config))
        .with_metrics(simulation_metrics.clone());
    if config.persistence.enabled {
        let path = config.persistence.log_path();
        let sink = JsonlSnapshotLog::open(&path)
            .with_context(|| format!("failed to open snapshot log {}", path.display()))?;
        info!(path = %path.display(), "snapshot persistence enabled");
        runtime = runtime.with_sink(Arc::new(sink));
    }
    let handle = runtime.start();

    let forwarder: Option<JoinHandle<()>> = queue.map(|queue| {
        let forwarder = NatsForwarder::new(config.telemetry.effective_broker_url())
            .with_failure_counter(simulation_metrics.publish_failure_counter());
        let shutdown = handle.subscribe_shutdown();
        tokio::spawn(async move {
            let url = forwarder.url().to_owned();
            if let Err(err) = forwarder.run(queue, shutdown).await {
                warn!(url = %url, error = %err, "nats forwarder stopped with error");
            }
        })
    });

    let mut api_server: Option<ApiServer> = None;
    if config.api.enabled {
        let state = Arc::new(ApiState::new(registry.clone()));
        match spawn_api_server(state, config.api.listen) {
            Ok(server) => api_server = Some(server),
            Err(err) => warn!(error = %err, "failed to start api server"),
        }
    } else {
        info!("api server disabled by configuration");
    }

    info!(cells = registry.len(), "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    handle.shutdown().await?;

    if let Some(task) = forwarder {
        if let Err(err) = task.await {
            warn!(error = %err, "nats forwarder task join error");
        }
    }

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    if let Some(server) = api_server {
        server.shutdown().await?;
    }

    Ok(())
}
