//! ELM327 Adapter Link
//!
//! This crate owns the byte-stream side of an ELM327-compatible adapter:
//! turning the raw stream into line/prompt tokens, queueing them for a
//! single consumer, and driving the AT command initialization sequence
//! that ends with the adapter in monitor mode.

mod command;
mod error;
mod journal;
mod link;
mod protocol;
mod queue;
mod sequencer;
mod token;
mod tokenizer;
mod transport;

pub use command::{CommandScript, MonitorCommand, MonitorMode};
pub use error::LinkError;
pub use journal::{LogSink, SessionLog};
pub use link::{Link, StreamingLink};
pub use protocol::ObdProtocol;
pub use queue::{token_queue, TokenReceiver, TokenSender, DEFAULT_QUEUE_CAPACITY};
pub use sequencer::{CommandSequencer, InitOutcome, Reply, SequencerConfig};
pub use token::{ResponseClass, Token};
pub use tokenizer::{spawn_tokenizer, LineSplitter, TokenizerHandle};
pub use transport::{connect, split_stream, AdapterEndpoint, AdapterReader, AdapterWriter};
