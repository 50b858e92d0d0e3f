//! Bridge configuration
//!
//! Layered: an optional TOML file, then `ELM_BRIDGE__SECTION__FIELD`
//! environment variables. Every field has a default.

use crate::error::BridgeError;
use elm_link::{AdapterEndpoint, ObdProtocol, SequencerConfig};
use live_table::TableConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ELM_BRIDGE";

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "elm-bridge.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub adapter: AdapterConfig,
    pub sequencer: SequencerSection,
    pub monitor: MonitorSection,
    pub tcp: TcpSection,
    pub table: TableConfig,
    pub logs: LogsSection,
    pub display: DisplaySection,
    pub replay: ReplaySection,
}

/// How the adapter is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Serial,
    Tcp,
}

/// Adapter connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub kind: AdapterKind,
    /// Serial device path
    pub device: String,
    pub baud_rate: u32,
    /// Wi-Fi adapter address
    pub host: String,
    pub port: u16,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            kind: AdapterKind::Serial,
            device: "/dev/rfcomm0".to_string(),
            baud_rate: 38400,
            host: "192.168.0.10".to_string(),
            port: 35000,
        }
    }
}

impl AdapterConfig {
    pub fn endpoint(&self) -> AdapterEndpoint {
        match self.kind {
            AdapterKind::Serial => AdapterEndpoint::Serial {
                device: self.device.clone(),
                baud_rate: self.baud_rate,
            },
            AdapterKind::Tcp => AdapterEndpoint::Tcp {
                host: self.host.clone(),
                port: self.port,
            },
        }
    }
}

/// Initialization sequence timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSection {
    /// Per-command response deadline (ms)
    pub command_timeout_ms: u64,
    /// Pause after each acknowledged command (ms)
    pub inter_command_delay_ms: u64,
    /// Bus protocol written into a freshly seeded command file
    pub protocol: ObdProtocol,
}

impl Default for SequencerSection {
    fn default() -> Self {
        Self {
            command_timeout_ms: 5000,
            inter_command_delay_ms: 80,
            protocol: ObdProtocol::default(),
        }
    }
}

impl SequencerSection {
    pub fn to_sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            inter_command_delay: Duration::from_millis(self.inter_command_delay_ms),
        }
    }
}

/// Streaming phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub poll_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 2000,
            queue_capacity: elm_link::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MonitorSection {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Dashboard listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpSection {
    pub bind: String,
    pub port: u16,
    pub write_timeout_ms: u64,
}

impl Default for TcpSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 35000,
            write_timeout_ms: 1000,
        }
    }
}

impl TcpSection {
    pub fn socket_addr(&self) -> Result<SocketAddr, BridgeError> {
        let ip: IpAddr = self
            .bind
            .trim()
            .parse()
            .map_err(|e| BridgeError::Config(format!("tcp.bind {}: {}", self.bind, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Log and command file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsSection {
    pub dir: PathBuf,
    pub capture_file: String,
    pub diagnostic_file: String,
    pub commands_file: String,
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("car_logs"),
            capture_file: "elm_input_log.txt".to_string(),
            diagnostic_file: "elm_output_log.txt".to_string(),
            commands_file: "at_commands.txt".to_string(),
        }
    }
}

impl LogsSection {
    pub fn capture_path(&self) -> PathBuf {
        self.dir.join(&self.capture_file)
    }

    pub fn diagnostic_path(&self) -> PathBuf {
        self.dir.join(&self.diagnostic_file)
    }

    pub fn commands_path(&self) -> PathBuf {
        self.dir.join(&self.commands_file)
    }
}

/// Periodic live table printout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// 0 disables the printout
    pub interval_ms: u64,
    /// Identifier to select for frequency measurement
    pub filter: Option<String>,
}

/// Capture replay pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySection {
    pub frame_delay_ms: u64,
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self { frame_delay_ms: 50 }
    }
}

impl ReplaySection {
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }
}

impl BridgeConfig {
    /// Load from `path` (or [`DEFAULT_CONFIG_FILE`]) and the environment.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, BridgeError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        debug!("Loading configuration from {}", path.display());

        let config = Self::layered(
            config::File::from(path).required(false),
            config::Environment::with_prefix(ENV_PREFIX).separator("__"),
        )?;
        info!(
            "Configuration loaded (adapter {}, tcp {})",
            config.adapter.endpoint(),
            config.tcp.socket_addr()?
        );
        Ok(config)
    }

    /// File layer under an environment layer. Environment values stay
    /// strings until deserialized, so identifiers like `7E8` are not read
    /// as numbers.
    fn layered<F>(file: F, env: config::Environment) -> Result<Self, BridgeError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without consulting the environment
    pub fn from_toml(text: &str) -> Result<Self, BridgeError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.monitor.queue_capacity == 0 {
            return Err(BridgeError::Config(
                "monitor.queue_capacity must be positive".to_string(),
            ));
        }
        if self.table.max_rows == 0 {
            return Err(BridgeError::Config("table.max_rows must be positive".to_string()));
        }
        if self.sequencer.command_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "sequencer.command_timeout_ms must be positive".to_string(),
            ));
        }
        self.tcp.socket_addr()?;
        Ok(())
    }
}
