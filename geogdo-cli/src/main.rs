//! geogdo daemon entry point.

mod assembly;
mod feed;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use geogdo_config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::feed::StdinFeed;

/// Watches vehicle telemetry and operates garage doors on geofence
/// crossings. Feed messages arrive on stdin as `<topic> <payload>` lines;
/// outgoing door commands are written to stdout in the same shape.
#[derive(Debug, Parser)]
#[command(name = "geogdo", version)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(short = 'c', long, env = "CONFIG_FILE")]
    config: PathBuf,

    /// Simulate door hardware instead of sending commands.
    #[arg(long)]
    testing: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config).context("loading configuration")?;
    let testing = config.global.testing || cli.testing;
    if testing {
        info!("testing mode enabled, door hardware is simulated");
    }

    let app = assembly::build(&config, testing).context("building door fleet")?;
    info!(
        doors = app.doors.len(),
        prefix = %config.global.tracker_prefix,
        "geogdo started, reading telemetry from stdin"
    );

    let mut input = StdinFeed::new();
    loop {
        tokio::select! {
            signal = shutdown_signal() => {
                info!(signal, "shutdown signal received");
                break;
            }
            msg = input.next() => match msg.context("reading telemetry feed")? {
                Some(msg) => {
                    if !app.status.route(&msg.topic, &msg.payload) {
                        app.dispatcher.dispatch(&msg.topic, &msg.payload).await;
                    }
                }
                None => {
                    info!("telemetry feed ended");
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
