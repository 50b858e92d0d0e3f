//! Adapter Initialization Sequencer
//!
//! Sends the setup commands one at a time and waits for each to settle
//! before moving on. The first command that gets no reply at all aborts the
//! whole sequence.

use crate::command::{CommandScript, MonitorMode};
use crate::error::LinkError;
use crate::link::{Link, StreamingLink};
use crate::token::{ResponseClass, Token};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the initialization sequence
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Deadline for each command (default: 5000 ms)
    pub command_timeout: Duration,
    /// Pause after each settled command (default: 80 ms)
    pub inter_command_delay: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(5000),
            inter_command_delay: Duration::from_millis(80),
        }
    }
}

/// How a command settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A recognized reply marker arrived
    Definitive { class: ResponseClass, token: Token },
    /// Only unrecognized data arrived before the deadline
    Partial { tokens: usize },
}

/// Where initialization left the adapter
pub enum InitOutcome {
    /// Monitor command sent, adapter is streaming
    Streaming(StreamingLink),
    /// Script had no monitor command; link closed
    Finished,
    /// Monitor command is not a streaming form; link closed
    UnsupportedMonitor(String),
}

impl std::fmt::Debug for InitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitOutcome::Streaming(_) => write!(f, "Streaming"),
            InitOutcome::Finished => write!(f, "Finished"),
            InitOutcome::UnsupportedMonitor(cmd) => write!(f, "UnsupportedMonitor({})", cmd),
        }
    }
}

/// Drives a [`Link`] through the command script
pub struct CommandSequencer {
    link: Link,
    config: SequencerConfig,
}

impl CommandSequencer {
    pub fn new(link: Link, config: SequencerConfig) -> Self {
        Self { link, config }
    }

    /// Send one command and wait for it to settle.
    ///
    /// A recognized marker settles immediately. If the deadline passes,
    /// having seen any token at all still counts as a reply, since the
    /// adapter may already be streaming; seeing nothing is a timeout.
    pub async fn send_and_wait(&mut self, command: &str) -> Result<Reply, LinkError> {
        self.link.send_command(command).await?;

        let deadline = Instant::now() + self.config.command_timeout;
        let mut seen = 0usize;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(token) = self.link.poll(remaining).await? else {
                continue;
            };
            seen += 1;
            debug!("<< {}", token);
            if let Some(class) = ResponseClass::classify(&token) {
                return Ok(Reply::Definitive { class, token });
            }
        }

        if seen > 0 {
            info!(
                "Got some data but no definitive OK/ERROR/banner within timeout for {}",
                command
            );
            self.link.log().diag(format!(
                "Got some data but no definitive OK/ERROR/banner within timeout for {}.",
                command
            ));
            Ok(Reply::Partial { tokens: seen })
        } else {
            let timeout_ms = self.config.command_timeout.as_millis() as u64;
            warn!("Timeout waiting for response to {}", command);
            self.link
                .log()
                .diag(format!("!! Timeout for {}", command));
            Err(LinkError::Timeout {
                command: command.to_string(),
                timeout_ms,
            })
        }
    }

    /// Run the script. On the first failure the link is closed and the
    /// error returned; later commands are never sent.
    pub async fn run(mut self, script: &CommandScript) -> Result<InitOutcome, LinkError> {
        for command in script.setup_commands() {
            match self.send_and_wait(command).await {
                Ok(reply) => {
                    debug!("{} settled: {:?}", command, reply);
                    tokio::time::sleep(self.config.inter_command_delay).await;
                }
                Err(e) => {
                    warn!("Command [{}] failed, aborting sequence: {}", command, e);
                    self.link
                        .log()
                        .diag(format!("Command [{}] failed -> aborting sequence.", command));
                    if let Err(close_err) = self.link.close().await {
                        debug!("Link closed after abort: {}", close_err);
                    }
                    return Err(e);
                }
            }
        }

        let Some(monitor) = script.monitor() else {
            info!("No monitor command in script; sequence finished");
            self.link
                .log()
                .diag("No monitor command in AT file; finished sequence.");
            self.close_quietly().await;
            return Ok(InitOutcome::Finished);
        };

        match monitor.mode() {
            MonitorMode::Continuous => {
                info!("Entering continuous monitor with {}", monitor.text());
                self.link
                    .log()
                    .diag(format!("Entering continuous monitor ({}).", monitor.text()));
                if let Err(e) = self.link.send_command(monitor.text()).await {
                    self.close_quietly().await;
                    return Err(e);
                }
                Ok(InitOutcome::Streaming(self.link.into_streaming()))
            }
            MonitorMode::Receiver => {
                warn!("Monitor command not supported: {}", monitor.text());
                self.link
                    .log()
                    .diag(format!("Monitor command not recognized: {}", monitor.text()));
                self.close_quietly().await;
                Ok(InitOutcome::UnsupportedMonitor(monitor.text().to_string()))
            }
        }
    }

    async fn close_quietly(self) {
        if let Err(e) = self.link.close().await {
            debug!("Link closed: {}", e);
        }
    }
}
