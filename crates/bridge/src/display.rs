//! Periodic live table printout

use live_table::LiveTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Print the table and frequency label every `interval` until cancelled
pub fn spawn_display(
    table: Arc<LiveTable>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    println!("{}{}", table.render(), table.frequency_label());
                    debug!("Known IDs: {}", table.known_ids().join(", "));
                }
            }
        }
    })
}
