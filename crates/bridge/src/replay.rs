//! Capture Replay
//!
//! Sends a previously captured monitor log to the dashboard, paced like a
//! live stream.

use crate::error::BridgeError;
use crate::tcp::TcpBridge;
use frame_codec::encode_frame;
use live_table::LiveTable;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of transmitted-command echoes in the capture log
const TX_ECHO_PREFIX: &str = ">>";

/// Replay counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub sent: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Replay the capture at `path`. Waits for a dashboard client first; a
/// failed send is counted and replay carries on.
pub async fn replay_capture(
    path: &Path,
    bridge: &TcpBridge,
    table: &LiveTable,
    frame_delay: Duration,
    cancel: &CancellationToken,
) -> Result<ReplayReport, BridgeError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    let mut report = ReplayReport::default();

    if !bridge.is_live().await {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Replay cancelled before a client connected");
                return Ok(report);
            }
            accepted = bridge.accept_one() => { accepted?; }
        }
    }
    info!("Replaying {} ...", path.display());

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        if cancel.is_cancelled() {
            info!("Replay cancelled");
            break;
        }
        let line = match std::str::from_utf8(&raw) {
            Ok(text) => text.trim_end_matches(&['\r', '\n'][..]).to_string(),
            Err(_) => {
                debug!(
                    "Replay skipped non-UTF-8 line: {}",
                    String::from_utf8_lossy(&raw).trim_end()
                );
                report.skipped += 1;
                continue;
            }
        };
        if line.trim_start().starts_with(TX_ECHO_PREFIX) {
            report.skipped += 1;
            continue;
        }

        let frame = match encode_frame(&line) {
            Ok(frame) if frame.is_forwardable() => frame,
            Ok(_) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                debug!("Replay skipped {:?}: {}", line, e);
                report.skipped += 1;
                continue;
            }
        };

        if bridge.send_frame(&frame).await {
            report.sent += 1;
        } else {
            report.failed += 1;
        }
        table.observe_line(&line);

        if !frame_delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(frame_delay) => {}
            }
        }
    }

    if report.failed > 0 {
        warn!("{} replayed frames could not be sent", report.failed);
    }
    info!(
        "Replay finished: {} sent, {} skipped, {} failed",
        report.sent, report.skipped, report.failed
    );
    Ok(report)
}
