//! Append-only Session Logs
//!
//! Two plain-text side channels: the raw capture (every accepted monitor
//! line, replayable later) and the diagnostic log (commands, replies,
//! timeouts, drops). Each file has its own lock so the tokenizer and the
//! command path can append concurrently.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// One append-only text file
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogSink {
    /// Open (creating parent directories and the file if needed)
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// File location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; a trailing newline is added
    pub fn append(&self, record: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Lock error: {}", e)))?;
        writeln!(file, "{}", record)
    }
}

/// The pair of log files for one bridge session
#[derive(Debug, Default)]
pub struct SessionLog {
    capture: Option<LogSink>,
    diagnostic: Option<LogSink>,
}

impl SessionLog {
    /// A log that writes nothing (tests, replay without capture)
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open both sinks
    pub fn open(capture: impl AsRef<Path>, diagnostic: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            capture: Some(LogSink::open(capture)?),
            diagnostic: Some(LogSink::open(diagnostic)?),
        })
    }

    /// Raw capture file, if enabled
    pub fn capture_path(&self) -> Option<&Path> {
        self.capture.as_ref().map(LogSink::path)
    }

    /// Append a line to the raw capture. Tabs are replaced so every record
    /// stays a single plain field.
    pub fn capture(&self, line: &str) {
        if let Some(sink) = &self.capture {
            if let Err(e) = sink.append(&line.replace('\t', " ")) {
                warn!("Capture log write failed: {}", e);
            }
        }
    }

    /// Append a timestamped record to the diagnostic log
    pub fn diag(&self, message: impl AsRef<str>) {
        if let Some(sink) = &self.diagnostic {
            let stamp = chrono::Local::now().format("%H:%M:%S");
            if let Err(e) = sink.append(&format!("{}  {}", stamp, message.as_ref())) {
                warn!("Diagnostic log write failed: {}", e);
            }
        }
    }
}
