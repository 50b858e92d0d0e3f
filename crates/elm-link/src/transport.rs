//! Adapter Transports
//!
//! The link only needs an ordered byte stream in each direction. Wired and
//! Bluetooth-bound adapters show up as serial devices; Wi-Fi adapters
//! expose a TCP socket.

use crate::error::LinkError;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

/// Reading half of an adapter connection
pub type AdapterReader = Box<dyn AsyncRead + Send + Unpin>;
/// Writing half of an adapter connection
pub type AdapterWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where the adapter is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEndpoint {
    /// Serial device path (e.g. "/dev/rfcomm0", "/dev/ttyUSB0" or "COM3")
    Serial { device: String, baud_rate: u32 },
    /// Wi-Fi adapter socket
    Tcp { host: String, port: u16 },
}

impl std::fmt::Display for AdapterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterEndpoint::Serial { device, baud_rate } => write!(f, "{} @ {} baud", device, baud_rate),
            AdapterEndpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Split any bidirectional stream into boxed halves
pub fn split_stream<S>(stream: S) -> (AdapterReader, AdapterWriter)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    (Box::new(reader), Box::new(writer))
}

/// Open the adapter connection
pub async fn connect(
    endpoint: &AdapterEndpoint,
    connect_timeout: Duration,
) -> Result<(AdapterReader, AdapterWriter), LinkError> {
    info!("Connecting to adapter at {} ...", endpoint);
    match endpoint {
        AdapterEndpoint::Serial { device, baud_rate } => {
            let port = tokio_serial::new(device.as_str(), *baud_rate)
                .timeout(connect_timeout)
                .open_native_async()?;
            info!("Serial port {} open", device);
            Ok(split_stream(port))
        }
        AdapterEndpoint::Tcp { host, port } => {
            let stream = tokio::time::timeout(
                connect_timeout,
                TcpStream::connect((host.as_str(), *port)),
            )
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {}:{} timed out", host, port),
                )
            })??;
            stream.set_nodelay(true)?;
            info!("Adapter socket connected to {}", stream.peer_addr()?);
            Ok(split_stream(stream))
        }
    }
}
