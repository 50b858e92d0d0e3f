//! ELM327 to Dashboard Bridge
//!
//! Initializes an ELM327 adapter into CAN monitor mode and forwards every
//! monitored frame to a single TCP dashboard client, keeping a live
//! per-identifier table alongside.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod config;
mod display;
mod error;
mod monitor;
mod replay;
mod session;
mod tcp;

pub use config::{
    AdapterConfig, AdapterKind, BridgeConfig, DisplaySection, LogsSection, MonitorSection,
    ReplaySection, SequencerSection, TcpSection, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
pub use display::spawn_display;
pub use error::BridgeError;
pub use monitor::{run_monitor, MonitorExit, MonitorReport};
pub use replay::{replay_capture, ReplayReport};
pub use session::{Session, SessionOutcome};
pub use tcp::TcpBridge;

/// Initialize logging
pub fn init_logging(verbose: bool) -> Result<(), BridgeError> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BridgeError::Config(format!("Failed to set tracing subscriber: {}", e)))
}
