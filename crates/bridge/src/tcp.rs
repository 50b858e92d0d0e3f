//! Single-client TCP Bridge
//!
//! Listens for one dashboard connection and pushes binary frames to it.
//! Sending fails closed: the first write error or write timeout drops the
//! client, and later sends report `false` until a new client is accepted.

use crate::error::BridgeError;
use frame_codec::BinaryFrame;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Client {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Dashboard-facing listener holding at most one client
pub struct TcpBridge {
    listener: TcpListener,
    client: Mutex<Option<Client>>,
    connected: AtomicBool,
    write_timeout: Duration,
}

impl TcpBridge {
    /// Bind and listen on `addr`
    pub async fn bind(addr: SocketAddr, write_timeout: Duration) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr).await?;
        info!("TCP bridge listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            client: Mutex::new(None),
            connected: AtomicBool::new(false),
            write_timeout,
        })
    }

    /// Bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for one client, replacing any current one
    pub async fn accept_one(&self) -> Result<SocketAddr, BridgeError> {
        info!("Waiting for dashboard client to connect...");
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay on {}: {}", peer, e);
        }

        let mut slot = self.client.lock().await;
        if let Some(old) = slot.replace(Client { stream, peer }) {
            info!("Replacing dashboard client {}", old.peer);
        }
        self.connected.store(true, Ordering::SeqCst);
        metrics::counter!("elm_bridge_clients_accepted_total").increment(1);
        info!("Dashboard client connected: {}", peer);
        Ok(peer)
    }

    /// Accept in the background
    pub fn spawn_accept(self: &Arc<Self>) -> JoinHandle<Result<SocketAddr, BridgeError>> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let result = bridge.accept_one().await;
            if let Err(e) = &result {
                warn!("Accept failed: {}", e);
            }
            result
        })
    }

    /// Write `bytes` to the client. Returns `false` without I/O when no
    /// live client is attached, and drops the client on any write failure.
    pub async fn send(&self, bytes: &[u8]) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }

        let mut slot = self.client.lock().await;
        let Some(client) = slot.as_mut() else {
            return false;
        };
        if !socket_ok(&client.stream) {
            debug!("Dashboard socket {} no longer usable", client.peer);
            self.release(&mut slot).await;
            return false;
        }

        let written = tokio::time::timeout(self.write_timeout, async {
            client.stream.write_all(bytes).await?;
            client.stream.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("TCP send to {} failed: {}", client.peer, e);
                self.release(&mut slot).await;
                false
            }
            Err(_) => {
                warn!(
                    "TCP send to {} timed out after {}ms",
                    client.peer,
                    self.write_timeout.as_millis()
                );
                self.release(&mut slot).await;
                false
            }
        }
    }

    /// Encode and send one frame
    pub async fn send_frame(&self, frame: &BinaryFrame) -> bool {
        self.send(&frame.to_bytes()).await
    }

    /// Connected flag plus the socket's own state
    pub async fn is_live(&self) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        match self.client.lock().await.as_ref() {
            Some(client) => socket_ok(&client.stream),
            None => false,
        }
    }

    /// Address of the attached client, if any
    pub async fn peer(&self) -> Option<SocketAddr> {
        self.client.lock().await.as_ref().map(|c| c.peer)
    }

    /// Drop the current client
    pub async fn disconnect(&self) {
        let mut slot = self.client.lock().await;
        self.release(&mut slot).await;
    }

    async fn release(&self, slot: &mut Option<Client>) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut client) = slot.take() {
            if let Err(e) = client.stream.shutdown().await {
                debug!("Shutdown of {}: {}", client.peer, e);
            }
            info!("Dashboard client {} released", client.peer);
        }
    }
}

fn socket_ok(stream: &TcpStream) -> bool {
    stream.peer_addr().is_ok() && matches!(stream.take_error(), Ok(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn bridge() -> Arc<TcpBridge> {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        Arc::new(TcpBridge::bind(addr, Duration::from_millis(500)).await.unwrap())
    }

    #[tokio::test]
    async fn test_send_without_client() {
        let bridge = bridge().await;
        assert!(!bridge.send(&[0xAA, 0x00, 0x01, 0x00, 0x55]).await);
        assert!(!bridge.is_live().await);
        assert!(bridge.peer().await.is_none());
    }

    #[tokio::test]
    async fn test_frames_reach_client() {
        let bridge = bridge().await;
        let accept = bridge.spawn_accept();
        let mut client = TcpStream::connect(bridge.local_addr().unwrap()).await.unwrap();
        accept.await.unwrap().unwrap();
        assert!(bridge.is_live().await);

        let frame = BinaryFrame::new(0x7E8, &[0x03, 0x41]).unwrap();
        assert!(bridge.send_frame(&frame).await);

        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xAA, 0x07, 0xE8, 0x02, 0x03, 0x41, 0x55]);
    }

    #[tokio::test]
    async fn test_disconnect_fails_closed() {
        let bridge = bridge().await;
        let accept = bridge.spawn_accept();
        let _client = TcpStream::connect(bridge.local_addr().unwrap()).await.unwrap();
        accept.await.unwrap().unwrap();

        bridge.disconnect().await;
        assert!(!bridge.is_live().await);
        assert!(!bridge.send(&[0x01]).await);
    }

    #[tokio::test]
    async fn test_peer_hangup_releases_client() {
        let bridge = bridge().await;
        let accept = bridge.spawn_accept();
        let client = TcpStream::connect(bridge.local_addr().unwrap()).await.unwrap();
        accept.await.unwrap().unwrap();
        drop(client);

        // The first writes may still land in the kernel buffer
        let mut failed = false;
        for _ in 0..50 {
            if !bridge.send(&[0xAA, 0x01, 0x23, 0x00, 0x55]).await {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(failed, "send never reported the closed peer");

        assert!(!bridge.is_live().await);
        assert!(bridge.peer().await.is_none());
        for _ in 0..5 {
            assert!(!bridge.send(&[0x01]).await);
        }
    }

    #[tokio::test]
    async fn test_reaccept_after_release() {
        let bridge = bridge().await;
        let addr = bridge.local_addr().unwrap();

        let accept = bridge.spawn_accept();
        let _first = TcpStream::connect(addr).await.unwrap();
        accept.await.unwrap().unwrap();
        bridge.disconnect().await;

        let accept = bridge.spawn_accept();
        let mut second = TcpStream::connect(addr).await.unwrap();
        accept.await.unwrap().unwrap();
        assert!(bridge.send(&[0x42]).await);

        let mut buf = [0u8; 1];
        second.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], 0x42);
    }
}
