//! Bridge Session
//!
//! One adapter session: seed/read the AT script, connect, run the
//! initialization sequence, then stream into the dashboard until the
//! adapter goes away or the session is cancelled.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::monitor::{run_monitor, MonitorReport};
use crate::tcp::TcpBridge;
use elm_link::{
    connect, AdapterReader, AdapterWriter, CommandScript, CommandSequencer, InitOutcome, Link,
    SessionLog,
};
use live_table::LiveTable;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The adapter reached monitor mode and streamed until the loop ended
    Streamed(MonitorReport),
    /// The script had no monitor command
    Finished,
    /// The script ended with a monitor command the bridge cannot stream
    UnsupportedMonitor(String),
    /// Stopped before the adapter reached monitor mode
    Cancelled,
}

/// Shared pieces a session runs against
pub struct Session<'a> {
    config: &'a BridgeConfig,
    bridge: &'a TcpBridge,
    table: &'a LiveTable,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a BridgeConfig, bridge: &'a TcpBridge, table: &'a LiveTable) -> Self {
        Self {
            config,
            bridge,
            table,
        }
    }

    /// Open the logs, load the script and connect to the configured adapter
    pub async fn run(&self, cancel: CancellationToken) -> Result<SessionOutcome, BridgeError> {
        let protocol = self.config.sequencer.protocol;
        if !protocol.has_short_ids() {
            warn!(
                "Protocol {:?} does not use 11-bit identifiers; frames will carry truncated IDs",
                protocol
            );
        }

        let logs = &self.config.logs;
        let log = Arc::new(SessionLog::open(logs.capture_path(), logs.diagnostic_path())?);
        info!(
            "Logging capture to {} and diagnostics to {}",
            logs.capture_path().display(),
            logs.diagnostic_path().display()
        );

        let script = CommandScript::load_or_seed(logs.commands_path(), protocol).await?;
        let endpoint = self.config.adapter.endpoint();
        let (reader, writer) =
            connect(&endpoint, self.config.sequencer.to_sequencer_config().command_timeout).await?;
        log.diag(format!("Connected to adapter at {}", endpoint));

        self.drive(reader, writer, &script, log, cancel).await
    }

    /// Initialize and stream over an already-open adapter connection
    pub async fn drive(
        &self,
        reader: AdapterReader,
        writer: AdapterWriter,
        script: &CommandScript,
        log: Arc<SessionLog>,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, BridgeError> {
        let link = Link::open(reader, writer, self.config.monitor.queue_capacity, log);

        // Cancelling the session stops the tokenizer, which unblocks any
        // pending wait in the sequencer
        let stop = link.stop_signal();
        let forward = {
            let cancel = cancel.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => stop.cancel(),
                    _ = stop.cancelled() => {}
                }
            })
        };

        let sequencer = CommandSequencer::new(link, self.config.sequencer.to_sequencer_config());
        let outcome = sequencer.run(script).await;
        let outcome = match outcome {
            Ok(InitOutcome::Streaming(streaming)) => {
                let report = run_monitor(
                    streaming,
                    self.bridge,
                    self.table,
                    self.config.monitor.poll_timeout(),
                    cancel,
                )
                .await;
                Ok(SessionOutcome::Streamed(report))
            }
            Ok(InitOutcome::Finished) => Ok(SessionOutcome::Finished),
            Ok(InitOutcome::UnsupportedMonitor(command)) => {
                Ok(SessionOutcome::UnsupportedMonitor(command))
            }
            Err(_) if cancel.is_cancelled() => {
                info!("Initialization cancelled");
                Ok(SessionOutcome::Cancelled)
            }
            Err(e) => {
                warn!("Adapter initialization failed: {}", e);
                Err(e.into())
            }
        };

        stop.cancel();
        let _ = forward.await;
        outcome
    }
}
