//! Stream Tokenizer
//!
//! Splits the adapter byte stream into [`Token`]s. Both `\r` and `\n` end a
//! line, so `\r\n`, bare `\r` and bare `\n` all behave the same; the blank
//! lines this produces are dropped. The `>` prompt is recognized on its own
//! because the adapter never terminates it with a newline.

use crate::error::LinkError;
use crate::journal::SessionLog;
use crate::queue::TokenSender;
use crate::token::Token;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bytes requested per read
const READ_CHUNK: usize = 2048;

/// Incremental line/prompt splitter.
///
/// Works on raw bytes and only decodes complete segments, so the output
/// does not depend on how the stream was chunked.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every token it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Token> {
        self.pending.extend_from_slice(chunk);

        let mut tokens = Vec::new();
        let mut boundary = 0;
        for (i, &byte) in self.pending.iter().enumerate() {
            match byte {
                b'>' => {
                    push_line(&mut tokens, &self.pending[boundary..i]);
                    tokens.push(Token::Prompt);
                    boundary = i + 1;
                }
                b'\r' | b'\n' => {
                    push_line(&mut tokens, &self.pending[boundary..i]);
                    boundary = i + 1;
                }
                _ => {}
            }
        }
        self.pending.drain(..boundary);
        tokens
    }

    /// Undelimited bytes held for the next chunk
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Drop the undelimited tail, returning its length
    pub fn discard(&mut self) -> usize {
        let len = self.pending.len();
        self.pending.clear();
        len
    }
}

fn push_line(tokens: &mut Vec<Token>, bytes: &[u8]) {
    if let Some(token) = Token::line(&String::from_utf8_lossy(bytes)) {
        tokens.push(token);
    }
}

/// Handle to a running tokenizer task
#[derive(Debug)]
pub struct TokenizerHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<(), LinkError>>,
}

impl TokenizerHandle {
    /// Ask the task to stop. Interrupts a pending read; safe from any task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// A token that stops this tokenizer when cancelled
    pub fn stop_signal(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the task is still reading
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait for the task and return how it ended
    pub async fn join(self) -> Result<(), LinkError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(LinkError::Task(e.to_string())),
        }
    }
}

/// Start reading `reader` in the background, feeding tokens to `queue`.
///
/// The task ends on stop, end of stream, read error, or queue saturation.
/// Anything after the last terminator is dropped when it ends.
pub fn spawn_tokenizer<R>(reader: R, queue: TokenSender, log: Arc<SessionLog>) -> TokenizerHandle
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_tokenizer(reader, queue, log, cancel.clone()));
    TokenizerHandle { cancel, task }
}

async fn run_tokenizer<R>(
    mut reader: R,
    queue: TokenSender,
    log: Arc<SessionLog>,
    cancel: CancellationToken,
) -> Result<(), LinkError>
where
    R: AsyncRead + Unpin,
{
    info!("Tokenizer started");
    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; READ_CHUNK];

    let result = loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            read = reader.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => {
                warn!("Adapter closed the stream");
                log.diag("Reader: adapter closed the stream");
                break Err(LinkError::Disconnected);
            }
            Ok(n) => n,
            Err(e) => {
                error!("Adapter read error: {}", e);
                log.diag(format!("Reader read error: {}", e));
                break Err(LinkError::Io(e));
            }
        };

        debug!("RAW: {}", String::from_utf8_lossy(&buf[..n]).escape_debug());

        let mut outcome = Ok(());
        for token in splitter.feed(&buf[..n]) {
            log.diag(format!("<< {}", token));
            outcome = queue.offer(token);
            if outcome.is_err() {
                break;
            }
        }
        match outcome {
            Ok(()) => {}
            Err(LinkError::Disconnected) => {
                debug!("Token consumer gone, stopping");
                break Ok(());
            }
            Err(e) => {
                error!("Tokenizer stopping: {}", e);
                log.diag(format!("!! {}", e));
                break Err(e);
            }
        }
    };

    let dropped = splitter.discard();
    if dropped > 0 {
        debug!("Discarding {} undelimited bytes", dropped);
    }
    info!("Tokenizer stopped");
    log.diag("Reader thread stopped.");
    result
}
