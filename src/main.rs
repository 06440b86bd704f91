//! header-bridge: start a header-parsing node, print what it receives, and
//! stop it cleanly on the console sentinel or a signal.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use header_bridge::config::{self, loader, BridgeConfig, ConfigError};
use header_bridge::lifecycle::startup::{self, NodeBackend};
use header_bridge::lifecycle::Supervisor;
use header_bridge::observability;
use header_bridge::sink::ConsoleSink;

#[derive(Parser, Debug)]
#[command(name = "header-bridge")]
#[command(
    about = "Supervise a header-parsing node and print the headers it receives",
    long_about = None
)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides node.bind_address).
    #[arg(short, long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<BridgeConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.node.bind_address = bind.clone();
    }
    loader::revalidate(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    observability::logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = observability::metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.node.bind_address,
        backend = ?config.node.backend,
        "header-bridge starting"
    );

    let node = match NodeBackend::from_config(&config.node) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("Failed to load node: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut supervisor = Supervisor::new(node);

    println!("Starting node");
    if let Err(e) = supervisor.start(&config.node.bind_address, Arc::new(ConsoleSink::new())) {
        eprintln!("Failed to start node: {}", e);
        return ExitCode::FAILURE;
    }

    let listening = supervisor
        .node()
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| config.node.bind_address.clone());
    println!("Node is listening on http://{}", listening);
    println!("Type `{}` and press enter to stop", config.shutdown.sentinel.trim());

    supervisor.run_until_signaled(startup::shutdown_listener(&config.shutdown));

    println!("Stopping node");
    if let Err(e) = supervisor.stop() {
        eprintln!("Failed to stop node: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
