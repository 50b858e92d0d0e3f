//! Live CAN Table
//!
//! Keeps the latest decoded row per CAN identifier for display, and
//! measures how often the currently selected identifier is seen.

mod table;
mod window;

pub use table::{LiveRow, LiveTable, TableConfig};
pub use window::FrequencyWindow;

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
