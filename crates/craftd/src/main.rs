//! craftd: the craftgrid daemon.
//!
//! Single binary that assembles all craftgrid subsystems:
//! - World and metric store (redb)
//! - Status sampler
//! - Autoscaler (scale-to-zero)
//! - Metric retention
//! - REST API, DNS task-event hook, Prometheus exposition
//!
//! # Usage
//!
//! ```text
//! craftd run --config fleet.toml --port 8080 --data-dir /var/lib/craftgrid
//! craftd render --config fleet.toml --world survival
//! ```

mod fleet;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use craft_core::FleetConfig;
use craftgrid_api::ApiState;
use craftgrid_autoscale::Autoscaler;
use craftgrid_metrics::MetricPublisher;
use craftgrid_state::{epoch_secs, StateStore};

#[derive(Parser)]
#[command(name = "craftd", about = "craftgrid daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample, autoscale, and serve the API for every declared world.
    Run {
        /// Fleet config file.
        #[arg(long, default_value = "craftgrid.toml")]
        config: PathBuf,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/craftgrid")]
        data_dir: PathBuf,

        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Print the resource graph of the declared worlds as JSON.
    Render {
        #[arg(long, default_value = "craftgrid.toml")]
        config: PathBuf,

        /// Only this world.
        #[arg(long)]
        world: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run {
            config,
            data_dir,
            port,
        } => run(&config, &data_dir, port).await,
        Command::Render { config, world } => {
            let config = FleetConfig::from_file(&config)?;
            let graphs = fleet::render(&config, world.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&graphs)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,craftd=debug,craftgrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config_path: &Path, data_dir: &Path, port: u16) -> anyhow::Result<()> {
    info!(config = ?config_path, "craftgrid daemon starting");

    let config = FleetConfig::from_file(config_path)?;
    let sampling_interval = config.sampling_interval()?;
    let sampling_timeout = config.sampling_timeout()?;
    let evaluation_interval = config.evaluation_interval()?;

    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("craftgrid.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let worlds = fleet::sync_worlds(&state, &config, epoch_secs())?;
    let targets = worlds.iter().map(|w| w.publish_target()).collect::<Vec<_>>();

    let publisher = Arc::new(MetricPublisher::new(
        Arc::new(state.clone()),
        sampling_timeout,
    ));
    info!(
        worlds = targets.len(),
        interval_secs = sampling_interval.as_secs(),
        "status sampler initialized"
    );

    let autoscaler = Autoscaler::new(
        state.clone(),
        sampling_interval,
        config.autoscale.lookback_factor,
    );
    let evaluator = autoscaler.evaluator().clone();
    info!(
        interval_secs = evaluation_interval.as_secs(),
        lookback_factor = config.autoscale.lookback_factor,
        "autoscaler initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let mut handles = Vec::new();

    let sampler_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        publisher
            .run(targets, sampling_interval, sampler_shutdown)
            .await;
    }));

    let autoscale_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        autoscaler
            .run(evaluation_interval, autoscale_shutdown)
            .await;
    }));

    if let Some(retention) = config.retention()? {
        let retention_state = state.clone();
        let retention_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            fleet::run_retention(retention_state, retention, retention_shutdown).await;
        }));
    }

    // ── Start API server ───────────────────────────────────────

    let router = craftgrid_api::build_router(ApiState::new(state, evaluator));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    for handle in handles {
        let _ = handle.await;
    }

    info!("craftgrid daemon stopped");
    Ok(())
}
