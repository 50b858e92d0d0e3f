//! Adapter Link Phases
//!
//! A [`Link`] bundles the adapter writer, the token receiver and the
//! tokenizer for the initialization phase. Entering monitor mode turns it
//! into a [`StreamingLink`], which can read but no longer write. Only one
//! of the two exists at a time, so the queue never has two consumers.

use crate::error::LinkError;
use crate::journal::SessionLog;
use crate::queue::{token_queue, TokenReceiver};
use crate::token::Token;
use crate::tokenizer::{spawn_tokenizer, TokenizerHandle};
use crate::transport::{AdapterReader, AdapterWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Line terminator the adapter expects after each command
const COMMAND_TERMINATOR: &str = "\r";

/// Initialization-phase owner of the adapter connection
pub struct Link {
    writer: AdapterWriter,
    queue: TokenReceiver,
    tokenizer: TokenizerHandle,
    log: Arc<SessionLog>,
}

impl Link {
    /// Start the tokenizer on `reader`. Call before sending anything so an
    /// early banner is not missed.
    pub fn open(
        reader: AdapterReader,
        writer: AdapterWriter,
        queue_capacity: usize,
        log: Arc<SessionLog>,
    ) -> Self {
        let (tx, queue) = token_queue(queue_capacity);
        let tokenizer = spawn_tokenizer(reader, tx, log.clone());
        Self {
            writer,
            queue,
            tokenizer,
            log,
        }
    }

    /// Write one command with its terminator
    pub async fn send_command(&mut self, command: &str) -> Result<(), LinkError> {
        let framed = format!("{}{}", command, COMMAND_TERMINATOR);
        let written = async {
            self.writer.write_all(framed.as_bytes()).await?;
            self.writer.flush().await
        }
        .await;

        if let Err(e) = written {
            warn!("Write error sending {}: {}", command, e);
            self.log.diag(format!("Write error: {}", e));
            return Err(LinkError::Io(e));
        }

        debug!(">> {}", command);
        self.log.diag(format!(">> {}", command));
        self.log.capture(&format!(">> {}", command));
        Ok(())
    }

    /// Wait up to `timeout` for the next token
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Token>, LinkError> {
        self.queue.poll(timeout).await
    }

    /// Cancelling this token stops the tokenizer
    pub fn stop_signal(&self) -> CancellationToken {
        self.tokenizer.stop_signal()
    }

    /// Session log shared with the tokenizer
    pub fn log(&self) -> &Arc<SessionLog> {
        &self.log
    }

    /// Stop the tokenizer, close the connection and discard queued tokens.
    /// Returns how the tokenizer ended.
    pub async fn close(mut self) -> Result<(), LinkError> {
        self.tokenizer.stop();
        if let Err(e) = self.writer.shutdown().await {
            debug!("Adapter writer shutdown: {}", e);
        }
        let result = self.tokenizer.join().await;
        let dropped = self.queue.reset();
        if dropped > 0 {
            debug!("Discarded {} queued tokens", dropped);
        }
        info!("Adapter link closed");
        result
    }

    /// Hand the connection to the streaming phase
    pub fn into_streaming(self) -> StreamingLink {
        StreamingLink { link: self }
    }
}

/// Streaming-phase owner of the adapter connection
pub struct StreamingLink {
    link: Link,
}

impl StreamingLink {
    /// Wait up to `timeout` for the next token
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Token>, LinkError> {
        self.link.poll(timeout).await
    }

    /// Cancelling this token stops the tokenizer
    pub fn stop_signal(&self) -> CancellationToken {
        self.link.stop_signal()
    }

    /// Session log shared with the tokenizer
    pub fn log(&self) -> &Arc<SessionLog> {
        self.link.log()
    }

    /// Whether the tokenizer is still reading
    pub fn is_connected(&self) -> bool {
        self.link.tokenizer.is_running()
    }

    /// Stop the tokenizer and release the connection
    pub async fn close(self) -> Result<(), LinkError> {
        self.link.close().await
    }
}
