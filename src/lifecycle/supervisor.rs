//! Process supervisor: acquire, serve, wait for termination, shut down.

use std::net::SocketAddr;
#[cfg(test)]
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinError;

use crate::config::ServiceConfig;
use crate::http::RuntimeError;
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::lifecycle::signals::TerminationSignal;
use crate::lifecycle::startup::{self, AcquireError, ServiceProcess};
#[cfg(test)]
use crate::net::Listener;
use crate::observability::{metrics, LogSink};
use crate::store::StoreConnector;

/// Failures that end the process with a non-zero status.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("service runtime exited without a shutdown request")]
    RuntimeExited,

    #[error("service runtime panicked: {0}")]
    RuntimePanicked(#[source] JoinError),

    #[error("shutdown already ran")]
    ShutdownAlreadyRan,
}

pub struct Supervisor<C> {
    config: ServiceConfig,
    log_sink: LogSink,
    connector: C,
    ready: Option<oneshot::Sender<SocketAddr>>,
    #[cfg(test)]
    on_serving: Option<Box<dyn FnOnce(&Arc<Listener>) + Send>>,
}

impl<C: StoreConnector> Supervisor<C> {
    pub fn new(config: ServiceConfig, log_sink: LogSink, connector: C) -> Self {
        Self {
            config,
            log_sink,
            connector,
            ready: None,
            #[cfg(test)]
            on_serving: None,
        }
    }

    /// Report the bound address once the runtime is serving.
    pub fn with_ready_notifier(mut self, ready: oneshot::Sender<SocketAddr>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Run until `signal` fires and shutdown completes, or until serving fails.
    pub async fn run(mut self, signal: TerminationSignal) -> Result<ShutdownReport, SupervisorError> {
        let ServiceProcess {
            log_sink,
            runtime,
            listener,
            store,
        } = startup::acquire(&self.config, &self.log_sink, &self.connector).await?;
        metrics::start_exporter(&self.config.observability);

        let handle = runtime.handle();
        let address = listener.local_addr();
        let mut serving = runtime.spawn(listener.clone());
        tracing::info!(
            address = %address,
            backend = store.backend(),
            "Server started"
        );

        #[cfg(test)]
        if let Some(hook) = self.on_serving.take() {
            hook(&listener);
        }

        if let Some(ready) = self.ready.take() {
            // The receiver may have stopped caring.
            let _ = ready.send(address);
        }

        tokio::select! {
            _ = signal.wait() => {}
            joined = &mut serving => {
                let err = match joined {
                    Ok(Ok(())) => SupervisorError::RuntimeExited,
                    Ok(Err(e)) => SupervisorError::Runtime(e),
                    Err(e) => SupervisorError::RuntimePanicked(e),
                };
                tracing::error!(error = %err, "Service runtime failed");
                return Err(err);
            }
        }

        let coordinator = ShutdownCoordinator::new(self.config.shutdown.grace_period());
        let resources = ServiceProcess::resources(listener, store, log_sink);
        let report = coordinator
            .shutdown(&handle, resources)
            .await
            .ok_or(SupervisorError::ShutdownAlreadyRan)?;

        match serving.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Accept loop ended with an error during shutdown"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(SupervisorError::RuntimePanicked(e)),
        }

        Ok(report)
    }
}
