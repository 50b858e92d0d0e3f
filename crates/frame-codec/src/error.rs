//! Codec Error Types

use thiserror::Error;

/// Reasons a monitor line is not turned into a frame
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Nothing left after whitespace removal
    #[error("Empty line")]
    Empty,

    /// Not enough hex digits for an identifier
    #[error("Only {found} hex characters, need at least 3")]
    TooShort { found: usize },

    /// Too much non-hex noise in the line
    #[error("Junk ratio {ratio:.2} exceeds {limit:.2}")]
    Noisy { ratio: f64, limit: f64 },

    /// Payload longer than a classic CAN frame
    #[error("Payload of {bytes} bytes exceeds 8")]
    PayloadTooLong { bytes: usize },

    /// Identifier is not valid base-16
    #[error("Invalid identifier: {0}")]
    BadIdentifier(String),
}
