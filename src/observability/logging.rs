//! Structured logging and the file log sink.
//!
//! # Responsibilities
//! - Open the dated log file at startup and close it last at shutdown
//! - Serialize writes from every task through one lock
//! - Install the tracing subscriber (stdout + log sink)
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - One file per process start, named by date; no mid-run rotation
//! - The sink is installed detached and opened later, so acquisition
//!   failures before the file exists still reach stdout

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Errors raised by the log sink.
#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to open log file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("log sink is already open at {0}")]
    AlreadyOpen(PathBuf),

    #[error("log sink is not open")]
    NotOpen,

    #[error("log sink write failed: {0}")]
    Write(#[source] io::Error),
}

#[derive(Default)]
struct SinkState {
    file: Option<File>,
    path: Option<PathBuf>,
}

/// Shared append-only log file.
///
/// Cheap to clone; every clone writes to the same file. Writes made while the
/// sink is not open are discarded.
#[derive(Clone, Default)]
pub struct LogSink {
    state: Arc<Mutex<SinkState>>,
}

impl LogSink {
    /// Create a detached sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `dir` if needed and open `<prefix>-<YYYY-MM-DD>.log` inside it for appending.
    pub fn open(&self, dir: &Path, prefix: &str) -> Result<PathBuf, LogSinkError> {
        let mut state = self.lock();
        if let Some(path) = &state.path {
            return Err(LogSinkError::AlreadyOpen(path.clone()));
        }

        fs::create_dir_all(dir).map_err(|source| LogSinkError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = dir.join(format!("{}-{}.log", prefix, date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogSinkError::Open {
                path: path.clone(),
                source,
            })?;

        state.file = Some(file);
        state.path = Some(path.clone());
        Ok(path)
    }

    /// Append one timestamped line.
    pub fn append(&self, line: &str) -> Result<(), LogSinkError> {
        let mut state = self.lock();
        let file = state.file.as_mut().ok_or(LogSinkError::NotOpen)?;
        let stamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S%.6f");
        file.write_all(format!("{} {}\n", stamp, line).as_bytes())
            .map_err(LogSinkError::Write)
    }

    /// Flush and close the file. Closing a sink that is not open is an error.
    pub fn close(&self) -> Result<(), LogSinkError> {
        let mut file = {
            let mut state = self.lock();
            let file = state.file.take().ok_or(LogSinkError::NotOpen)?;
            state.path = None;
            file
        };

        file.flush().map_err(LogSinkError::Write)?;
        file.sync_all().map_err(LogSinkError::Write)
    }

    pub fn is_open(&self) -> bool {
        self.lock().file.is_some()
    }

    /// Path of the currently open file.
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("path", &self.path())
            .finish()
    }
}

/// Writer handed to the fmt layer; holds the sink lock for one whole event.
pub struct SinkWriter<'a> {
    state: MutexGuard<'a, SinkState>,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.state.file.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter { state: self.lock() }
    }
}

/// Install the global subscriber: stdout plus the (possibly still detached) log sink.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, sink: LogSink) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("record_service={level},tower_http={level}").into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(sink),
        )
        .try_init()
}
