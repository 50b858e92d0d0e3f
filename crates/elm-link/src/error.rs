//! Adapter Link Error Types

use thiserror::Error;

/// Errors that can occur on the adapter link
#[derive(Debug, Error)]
pub enum LinkError {
    /// Read/write failure on the adapter stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No response at all before the command deadline
    #[error("Timeout waiting for response to {command} after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// Token queue is full; the consumer is not keeping up
    #[error("Token queue saturated ({capacity} tokens)")]
    QueueSaturated { capacity: usize },

    /// Adapter stream closed or its reader is gone
    #[error("Adapter link disconnected")]
    Disconnected,

    /// AT command file could not be read or written
    #[error("Command file error: {0}")]
    CommandFile(String),

    /// A background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio_serial::Error> for LinkError {
    fn from(err: tokio_serial::Error) -> Self {
        LinkError::Serial(err.to_string())
    }
}

impl LinkError {
    /// Whether the error means the adapter connection is gone
    pub fn is_transport_loss(&self) -> bool {
        matches!(
            self,
            LinkError::Io(_) | LinkError::Serial(_) | LinkError::Disconnected
        )
    }
}
