//! ELM Bridge - Main Entry Point

use anyhow::Context;
use bridge::{init_logging, replay_capture, spawn_display, BridgeConfig, Session, TcpBridge};
use clap::{Parser, Subcommand};
use live_table::LiveTable;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Forward ELM327 CAN monitor output to a TCP dashboard client.
#[derive(Parser)]
#[command(name = "elm-bridge", version, about)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the adapter and stream until it disconnects or Ctrl-C.
    Run {
        /// Identifier to measure frequency for (e.g. 7E8).
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Send a capture log to the dashboard client.
    Replay {
        /// Capture file (defaults to the configured capture log).
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("=== ELM Bridge v{} ===", env!("CARGO_PKG_VERSION"));

    let config = BridgeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let addr = config.tcp.socket_addr()?;
    let bridge = Arc::new(
        TcpBridge::bind(addr, config.tcp.write_timeout())
            .await
            .with_context(|| format!("binding TCP bridge on {}", addr))?,
    );
    let table = Arc::new(LiveTable::new(config.table.clone()));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping");
                cancel.cancel();
            }
        });
    }

    let display = (config.display.interval_ms > 0).then(|| {
        spawn_display(
            table.clone(),
            Duration::from_millis(config.display.interval_ms),
            cancel.clone(),
        )
    });

    match cli.command {
        Command::Run { filter } => {
            table.set_filter(filter.or_else(|| config.display.filter.clone()).as_deref());

            let accept = bridge.spawn_accept();
            match Session::new(&config, &bridge, &table).run(cancel.clone()).await {
                Ok(outcome) => info!("Session ended: {:?}", outcome),
                Err(e) => error!("Session failed: {}", e),
            }
            accept.abort();
        }
        Command::Replay { file } => {
            let path = file.unwrap_or_else(|| config.logs.capture_path());
            match replay_capture(
                &path,
                &bridge,
                &table,
                config.replay.frame_delay(),
                &cancel,
            )
            .await
            {
                Ok(report) => info!("Replay report: {:?}", report),
                Err(e) => error!("Replay of {} failed: {}", path.display(), e),
            }
        }
    }

    cancel.cancel();
    if let Some(display) = display {
        let _ = display.await;
    }
    info!("Bridge stopped");
    Ok(())
}
