//! AT Command Script
//!
//! The adapter setup is a plain text file with one command per line. The
//! last line starting with `ATMA` or `ATMR` is the monitor command that
//! switches the adapter to streaming; it is always sent last.

use crate::error::LinkError;
use crate::protocol::ObdProtocol;
use std::path::Path;
use tracing::info;

/// How a monitor command streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// `ATMA`: monitor all traffic continuously
    Continuous,
    /// `ATMR`: monitor for a receiver address, not streamed by this bridge
    Receiver,
}

/// The command that ends initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorCommand {
    text: String,
    mode: MonitorMode,
}

impl MonitorCommand {
    /// Recognize a monitor command by case-insensitive prefix
    pub fn recognize(line: &str) -> Option<Self> {
        let upper = line.to_ascii_uppercase();
        let mode = if upper.starts_with("ATMA") {
            MonitorMode::Continuous
        } else if upper.starts_with("ATMR") {
            MonitorMode::Receiver
        } else {
            return None;
        };
        Some(Self {
            text: line.to_string(),
            mode,
        })
    }

    /// Command text as written in the file
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> MonitorMode {
        self.mode
    }
}

/// Ordered adapter commands read once at session start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    commands: Vec<String>,
    monitor: Option<MonitorCommand>,
}

impl CommandScript {
    /// Build from lines; blank lines are skipped and the rest trimmed
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands: Vec<String> = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        let monitor = commands
            .iter()
            .rev()
            .find_map(|line| MonitorCommand::recognize(line));
        Self { commands, monitor }
    }

    /// Parse newline-delimited file contents
    pub fn parse(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    /// Factory script for an 11-bit CAN dashboard feed
    pub fn default_text(protocol: ObdProtocol) -> String {
        [
            "ATZ",
            "ATE0",
            "ATL0",
            "ATS0",
            "ATH1",
            "ATCAF0",
            protocol.select_command().as_str(),
            "ATMA",
        ]
        .join("\n")
    }

    /// Read the script from `path`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LinkError::CommandFile(format!("{}: {}", path.display(), e)))?;
        let script = Self::parse(&text);
        info!("Read {} AT commands from {}", script.len(), path.display());
        Ok(script)
    }

    /// Read the script, first writing the default one if the file is missing
    pub async fn load_or_seed(
        path: impl AsRef<Path>,
        protocol: ObdProtocol,
    ) -> Result<Self, LinkError> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| LinkError::CommandFile(format!("{}: {}", parent.display(), e)))?;
                }
            }
            tokio::fs::write(path, Self::default_text(protocol))
                .await
                .map_err(|e| LinkError::CommandFile(format!("{}: {}", path.display(), e)))?;
            info!("Wrote default AT commands to {}", path.display());
        }
        Self::load(path).await
    }

    /// Every command in file order
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Commands sent before the monitor command: everything up to the
    /// first line equal to it, or the whole script without one
    pub fn setup_commands(&self) -> &[String] {
        match &self.monitor {
            Some(monitor) => {
                let end = self
                    .commands
                    .iter()
                    .position(|cmd| cmd == monitor.text())
                    .unwrap_or(self.commands.len());
                &self.commands[..end]
            }
            None => &self.commands,
        }
    }

    pub fn monitor(&self) -> Option<&MonitorCommand> {
        self.monitor.as_ref()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
