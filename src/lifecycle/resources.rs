//! Releasable wrappers for the process-wide resources.

use std::sync::Arc;

use async_trait::async_trait;

use crate::lifecycle::shutdown::{Releasable, ReleaseError};
use crate::net::Listener;
use crate::observability::LogSink;
use crate::store::RecordStore;

/// The listening socket. Closing means dropping the last owner.
#[derive(Debug)]
pub struct ListenerResource {
    listener: Option<Arc<Listener>>,
}

impl ListenerResource {
    pub fn new(listener: Arc<Listener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }
}

#[async_trait]
impl Releasable for ListenerResource {
    fn name(&self) -> &'static str {
        "listener"
    }

    async fn release(&mut self) -> Result<(), ReleaseError> {
        let listener = self
            .listener
            .take()
            .ok_or(ReleaseError::AlreadyReleased("listener"))?;
        let address = listener.local_addr();

        match Arc::try_unwrap(listener) {
            Ok(listener) => {
                drop(listener);
                tracing::info!(address = %address, "Listening socket closed");
                Ok(())
            }
            Err(shared) => {
                let others = Arc::strong_count(&shared) - 1;
                Err(ReleaseError::ListenerShared(others))
            }
        }
    }
}

/// The shared record store.
pub struct StoreResource {
    store: Arc<dyn RecordStore>,
}

impl StoreResource {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Releasable for StoreResource {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn release(&mut self) -> Result<(), ReleaseError> {
        self.store.close().await?;
        tracing::info!(backend = self.store.backend(), "Store closed");
        Ok(())
    }
}

/// The log file. Released last so every earlier step is captured.
#[derive(Debug)]
pub struct LogSinkResource {
    sink: LogSink,
}

impl LogSinkResource {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Releasable for LogSinkResource {
    fn name(&self) -> &'static str {
        "log_sink"
    }

    async fn release(&mut self) -> Result<(), ReleaseError> {
        if let Some(path) = self.sink.path() {
            tracing::info!(path = %path.display(), "Closing log file");
        }
        self.sink.close()?;
        Ok(())
    }
}
