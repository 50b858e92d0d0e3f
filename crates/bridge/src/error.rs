//! Bridge Error Types

use elm_link::LinkError;
use thiserror::Error;

/// Errors that can occur while running the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Listener, client socket or capture file failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Adapter link failure (connect, initialization or streaming)
    #[error("Adapter link error: {0}")]
    Link(#[from] LinkError),
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}
