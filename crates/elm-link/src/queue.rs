//! Bounded Token Queue
//!
//! One producer (the tokenizer) and exactly one consumer. The receiving half
//! is not cloneable, so whichever phase holds it is the only reader.

use crate::error::LinkError;
use crate::token::Token;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default queue capacity in tokens
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Create a bounded token queue
pub fn token_queue(capacity: usize) -> (TokenSender, TokenReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TokenSender {
            tx,
            capacity: capacity.max(1),
        },
        TokenReceiver { rx },
    )
}

/// Producing half, owned by the tokenizer
#[derive(Debug)]
pub struct TokenSender {
    tx: mpsc::Sender<Token>,
    capacity: usize,
}

impl TokenSender {
    /// Enqueue without waiting. A full queue is an error, never a stall.
    pub fn offer(&self, token: Token) -> Result<(), LinkError> {
        match self.tx.try_send(token) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LinkError::QueueSaturated {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(_)) => Err(LinkError::Disconnected),
        }
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consuming half, held by the active phase
#[derive(Debug)]
pub struct TokenReceiver {
    rx: mpsc::Receiver<Token>,
}

impl TokenReceiver {
    /// Wait up to `timeout` for the next token.
    ///
    /// `Ok(None)` means the wait timed out. `Err(Disconnected)` means the
    /// producer is gone and every queued token has been delivered.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Token>, LinkError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(token)) => Ok(Some(token)),
            Ok(None) => Err(LinkError::Disconnected),
            Err(_) => Ok(None),
        }
    }

    /// Discard everything queued, returning how many tokens were dropped
    pub fn reset(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
