//! Monitor Loop
//!
//! Drains the token queue once the adapter is streaming: every line goes to
//! the live table and the capture log, and lines that encode to a non-empty
//! frame are forwarded to the dashboard.

use crate::tcp::TcpBridge;
use elm_link::{LinkError, StreamingLink, Token};
use frame_codec::encode_frame;
use live_table::LiveTable;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// The adapter stream closed
    Disconnected,
    /// The adapter stream failed
    ReadError(String),
    /// Stopped from outside
    Cancelled,
}

impl fmt::Display for MonitorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorExit::Disconnected => write!(f, "adapter disconnected"),
            MonitorExit::ReadError(e) => write!(f, "read error: {}", e),
            MonitorExit::Cancelled => write!(f, "stopped"),
        }
    }
}

/// Counters for one streaming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub lines: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub send_failures: u64,
    pub exit: MonitorExit,
}

/// Stream until the adapter goes away or `cancel` fires, then close the
/// link (stopping the tokenizer)
pub async fn run_monitor(
    mut link: StreamingLink,
    bridge: &TcpBridge,
    table: &LiveTable,
    poll_timeout: Duration,
    cancel: CancellationToken,
) -> MonitorReport {
    let log = link.log().clone();
    let mut report = MonitorReport {
        lines: 0,
        forwarded: 0,
        dropped: 0,
        send_failures: 0,
        exit: MonitorExit::Disconnected,
    };
    info!("Monitor loop started");
    log.diag("Monitor loop started");

    let mut exit = loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => break MonitorExit::Cancelled,
            polled = link.poll(poll_timeout) => polled,
        };

        let line = match polled {
            Ok(Some(Token::Line(line))) => line,
            Ok(Some(Token::Prompt)) | Ok(None) => continue,
            Err(LinkError::Disconnected) => break MonitorExit::Disconnected,
            Err(e) => break MonitorExit::ReadError(e.to_string()),
        };
        if line.trim().is_empty() {
            continue;
        }

        report.lines += 1;
        metrics::counter!("elm_bridge_lines_total").increment(1);
        table.observe_line(&line);
        log.capture(&line);

        match encode_frame(&line) {
            Ok(frame) if frame.is_forwardable() => {
                if bridge.send_frame(&frame).await {
                    report.forwarded += 1;
                    metrics::counter!("elm_bridge_frames_forwarded_total").increment(1);
                } else {
                    report.send_failures += 1;
                    metrics::counter!("elm_bridge_send_failures_total").increment(1);
                }
                log.diag(format!("FRAME: {}", line));
            }
            Ok(_) => {
                report.dropped += 1;
                metrics::counter!("elm_bridge_lines_dropped_total").increment(1);
                log.diag(format!("DROP: {}", line));
            }
            Err(e) => {
                debug!("Dropped {:?}: {}", line, e);
                report.dropped += 1;
                metrics::counter!("elm_bridge_lines_dropped_total").increment(1);
                log.diag(format!("DROP: {}", line));
            }
        }
    };

    // Session cancellation also stops the tokenizer, so the queue may
    // report the disconnect first
    if cancel.is_cancelled() {
        exit = MonitorExit::Cancelled;
    }

    // The tokenizer's own result says whether the stream ended or failed
    match link.close().await {
        Ok(()) => {}
        Err(LinkError::Disconnected) => {}
        Err(e) => {
            if exit == MonitorExit::Disconnected {
                exit = MonitorExit::ReadError(e.to_string());
            }
            error!("Tokenizer ended with error: {}", e);
        }
    }

    match &exit {
        MonitorExit::Cancelled => info!("Monitor loop stopped"),
        other => warn!("Monitor loop ended: {}", other),
    }
    log.diag(format!("Monitor loop ended: {}", exit));
    info!(
        "Streamed {} lines ({} forwarded, {} dropped, {} send failures)",
        report.lines, report.forwarded, report.dropped, report.send_failures
    );

    report.exit = exit;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use elm_link::{split_stream, Link, SessionLog};
    use live_table::TableConfig;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    async fn bridge() -> Arc<TcpBridge> {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        Arc::new(TcpBridge::bind(addr, Duration::from_millis(500)).await.unwrap())
    }

    fn streaming_link(adapter: tokio::io::DuplexStream) -> StreamingLink {
        let (reader, writer) = split_stream(adapter);
        Link::open(reader, writer, 64, Arc::new(SessionLog::disabled())).into_streaming()
    }

    #[tokio::test]
    async fn test_counts_and_exit_on_disconnect() {
        let (ours, mut adapter) = tokio::io::duplex(1024);
        let link = streaming_link(ours);
        let bridge = bridge().await;
        let table = LiveTable::new(TableConfig::default());

        adapter
            .write_all(b"7E8 03 41 0C 1A\r3A0\r##@@1A\r\r>")
            .await
            .unwrap();
        drop(adapter);

        let report = run_monitor(
            link,
            &bridge,
            &table,
            Duration::from_millis(200),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(report.exit, MonitorExit::Disconnected);
        assert_eq!(report.lines, 3);
        // No client: the forward-worthy line counts as a failed send
        assert_eq!(report.forwarded, 0);
        assert_eq!(report.send_failures, 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(table.known_ids(), vec!["3A0", "7E8"]);
    }

    #[tokio::test]
    async fn test_cancel_stops_loop() {
        let (ours, _adapter) = tokio::io::duplex(1024);
        let link = streaming_link(ours);
        let bridge = bridge().await;
        let table = LiveTable::default();
        let cancel = CancellationToken::new();

        let task = {
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_monitor(link, &bridge, &table, Duration::from_millis(50), cancel).await
            })
        };
        cancel.cancel();
        let report = task.await.unwrap();
        assert_eq!(report.exit, MonitorExit::Cancelled);
        assert_eq!(report.lines, 0);
    }

    #[tokio::test]
    async fn test_forwards_to_client() {
        use tokio::io::AsyncReadExt;

        let (ours, mut adapter) = tokio::io::duplex(1024);
        let link = streaming_link(ours);
        let bridge = bridge().await;
        let accept = bridge.spawn_accept();
        let mut client = TcpStream::connect(bridge.local_addr().unwrap()).await.unwrap();
        accept.await.unwrap().unwrap();

        adapter.write_all(b"123 01 02\r").await.unwrap();
        drop(adapter);

        let table = LiveTable::default();
        let report = run_monitor(
            link,
            &bridge,
            &table,
            Duration::from_millis(200),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(report.forwarded, 1);

        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xAA, 0x01, 0x23, 0x02, 0x01, 0x02, 0x55]);
    }
}
