//! Startup orchestration.
//!
//! # Responsibilities
//! - Acquire the log sink, runtime, listening socket and store, in that order
//! - Hand the caller one owned `ServiceProcess` holding all of them
//!
//! # Design Decisions
//! - Fail fast: the first failing step aborts startup, later steps never run
//! - Steps run in order, not concurrently
//! - The runtime is built before the store exists; handlers reach the store
//!   through a slot filled by the last step
//! - Nothing is started here; the supervisor starts serving

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::http::handlers::{self, AppState};
use crate::http::ServiceRuntime;
use crate::lifecycle::resources::{ListenerResource, LogSinkResource, StoreResource};
use crate::lifecycle::shutdown::Releasable;
use crate::net::{Listener, ListenerError};
use crate::observability::{LogSink, LogSinkError};
use crate::store::{RecordStore, StoreConnector, StoreError, StoreSlot};

/// The acquisition steps that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStep {
    LogSink,
    Socket,
    Store,
}

impl fmt::Display for AcquireStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireStep::LogSink => write!(f, "log sink"),
            AcquireStep::Socket => write!(f, "listening socket"),
            AcquireStep::Store => write!(f, "store"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("failed to open log sink: {0}")]
    LogSink(#[source] LogSinkError),

    #[error("failed to open listening socket: {0}")]
    Socket(#[source] ListenerError),

    #[error("failed to connect to store: {0}")]
    Store(#[source] StoreError),
}

impl AcquireError {
    /// The step that failed.
    pub fn step(&self) -> AcquireStep {
        match self {
            AcquireError::LogSink(_) => AcquireStep::LogSink,
            AcquireError::Socket(_) => AcquireStep::Socket,
            AcquireError::Store(_) => AcquireStep::Store,
        }
    }
}

/// Every resource the process owns between startup and shutdown.
pub struct ServiceProcess {
    pub log_sink: LogSink,
    pub runtime: ServiceRuntime,
    pub listener: Arc<Listener>,
    pub store: Arc<dyn RecordStore>,
}

impl ServiceProcess {
    /// Release steps for shutdown: socket, store, then the log sink.
    pub fn resources(
        listener: Arc<Listener>,
        store: Arc<dyn RecordStore>,
        log_sink: LogSink,
    ) -> Vec<Box<dyn Releasable>> {
        vec![
            Box::new(ListenerResource::new(listener)),
            Box::new(StoreResource::new(store)),
            Box::new(LogSinkResource::new(log_sink)),
        ]
    }
}

impl fmt::Debug for ServiceProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProcess")
            .field("log_sink", &self.log_sink)
            .field("listener", &self.listener.local_addr())
            .field("store", &self.store.backend())
            .finish()
    }
}

/// Acquire every resource in order.
///
/// `log_sink` is opened in place so a subscriber already writing to it starts
/// capturing to the file as soon as step one succeeds.
pub async fn acquire(
    config: &ServiceConfig,
    log_sink: &LogSink,
    connector: &dyn StoreConnector,
) -> Result<ServiceProcess, AcquireError> {
    let log_path = log_sink
        .open(Path::new(&config.logging.directory), &config.logging.file_prefix)
        .map_err(AcquireError::LogSink)?;
    tracing::info!(path = %log_path.display(), "Log sink opened");

    let slot = StoreSlot::new();
    let router = handlers::routes(AppState { store: slot.clone() });
    let runtime = ServiceRuntime::new(router, &config.timeouts);
    tracing::debug!("Service runtime constructed");

    let listener = Listener::bind(&config.listener)
        .await
        .map_err(AcquireError::Socket)?;

    let store = connector
        .connect(&config.store)
        .await
        .map_err(AcquireError::Store)?;
    slot.fill(store.clone());
    tracing::info!(
        backend = store.backend(),
        host = %config.store.host,
        port = config.store.port,
        "Store connected"
    );

    Ok(ServiceProcess {
        log_sink: log_sink.clone(),
        runtime,
        listener: Arc::new(listener),
        store,
    })
}
