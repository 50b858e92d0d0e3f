//! End-to-end: initialization sequence, monitor loop and dashboard client

use bridge::{BridgeConfig, BridgeError, MonitorExit, Session, SessionOutcome, TcpBridge};
use elm_link::{split_stream, CommandScript, LinkError, SessionLog};
use live_table::LiveTable;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Acknowledges setup commands listed in `answered` with `OK`, answers
/// `ATMA` with `stream` and then hangs up (or keeps the line open when
/// `hold_open`). Returns the commands it received.
fn fake_adapter(
    mut stream: DuplexStream,
    answered: &'static [&'static str],
    monitor_output: &'static [u8],
    hold_open: bool,
) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut received = Vec::new();
        let mut pending = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return received,
                Ok(n) => n,
            };
            pending.extend_from_slice(&buf[..n]);
            while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
                let command = String::from_utf8_lossy(&pending[..pos]).to_string();
                pending.drain(..=pos);
                received.push(command.clone());

                if command == "ATMA" {
                    stream.write_all(monitor_output).await.unwrap();
                    if !hold_open {
                        return received;
                    }
                } else if answered.contains(&command.as_str()) {
                    stream.write_all(b"OK\r").await.unwrap();
                }
            }
        }
    })
}

fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.sequencer.inter_command_delay_ms = 0;
    config.sequencer.command_timeout_ms = 1000;
    config.monitor.poll_timeout_ms = 100;
    config
}

async fn bind_bridge() -> Arc<TcpBridge> {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Arc::new(TcpBridge::bind(addr, Duration::from_millis(500)).await.unwrap())
}

#[tokio::test]
async fn test_initialize_then_stream_to_dashboard() {
    let config = test_config();
    let bridge = bind_bridge().await;
    let table = LiveTable::new(config.table.clone());

    let accept = bridge.spawn_accept();
    let mut dashboard = TcpStream::connect(bridge.local_addr().unwrap()).await.unwrap();
    accept.await.unwrap().unwrap();

    let (host, adapter) = tokio::io::duplex(4096);
    let adapter = fake_adapter(
        adapter,
        &["ATZ", "ATE0", "ATH1"],
        b"7E8 03 41 0C 1A\r7E8 03 41 0D 20\r3A0\r",
        false,
    );
    let (reader, writer) = split_stream(host);
    let script = CommandScript::parse("ATZ\nATE0\nATH1\nATMA\n");

    let outcome = Session::new(&config, &bridge, &table)
        .drive(
            reader,
            writer,
            &script,
            Arc::new(SessionLog::disabled()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let SessionOutcome::Streamed(report) = outcome else {
        panic!("expected streaming outcome");
    };
    assert_eq!(report.exit, MonitorExit::Disconnected);
    assert_eq!(report.lines, 3);
    assert_eq!(report.forwarded, 2);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.send_failures, 0);

    assert_eq!(adapter.await.unwrap(), vec!["ATZ", "ATE0", "ATH1", "ATMA"]);

    let mut frames = [0u8; 18];
    dashboard.read_exact(&mut frames).await.unwrap();
    assert_eq!(
        frames,
        [
            0xAA, 0x07, 0xE8, 0x04, 0x03, 0x41, 0x0C, 0x1A, 0x55, //
            0xAA, 0x07, 0xE8, 0x04, 0x03, 0x41, 0x0D, 0x20, 0x55,
        ]
    );

    let rows = table.snapshot();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].display, "ID 7E8 03 41 0D 20");
    assert_eq!(rows[1].display, "ID 3A0 -");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_aborts_before_remaining_commands() {
    let config = test_config();
    let bridge = bind_bridge().await;
    let table = LiveTable::default();

    let (host, adapter) = tokio::io::duplex(4096);
    // ATE0 never answers
    let adapter = fake_adapter(adapter, &["ATZ", "ATL0"], b"", false);
    let (reader, writer) = split_stream(host);
    let script = CommandScript::parse("ATZ\nATE0\nATL0\nATMA\n");

    let result = Session::new(&config, &bridge, &table)
        .drive(
            reader,
            writer,
            &script,
            Arc::new(SessionLog::disabled()),
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(BridgeError::Link(LinkError::Timeout { command, timeout_ms })) => {
            assert_eq!(command, "ATE0");
            assert_eq!(timeout_ms, 1000);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(adapter.await.unwrap(), vec!["ATZ", "ATE0"]);
}

#[tokio::test]
async fn test_cancel_while_streaming() {
    let bridge = bind_bridge().await;
    let table = Arc::new(LiveTable::default());
    let cancel = CancellationToken::new();

    let (host, adapter) = tokio::io::duplex(4096);
    let _adapter = fake_adapter(adapter, &["ATZ"], b"123 01\r", true);
    let (reader, writer) = split_stream(host);
    let script = CommandScript::parse("ATZ\nATMA\n");

    let session = {
        let bridge = bridge.clone();
        let table = table.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let config = test_config();
            Session::new(&config, &bridge, &table)
                .drive(
                    reader,
                    writer,
                    &script,
                    Arc::new(SessionLog::disabled()),
                    cancel,
                )
                .await
        })
    };

    // Wait for the streamed line to land before stopping
    for _ in 0..100 {
        if !table.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    match session.await.unwrap().unwrap() {
        SessionOutcome::Streamed(report) => {
            assert_eq!(report.exit, MonitorExit::Cancelled);
            assert_eq!(report.lines, 1);
            // No dashboard attached
            assert_eq!(report.send_failures, 1);
        }
        other => panic!("expected streaming outcome, got {:?}", other),
    }
}
