//! Termination signal.
//!
//! # Responsibilities
//! - Represent "shutdown requested" as an explicit, cloneable future
//! - Translate SIGTERM/SIGINT (ctrl-c elsewhere) into that event
//! - Fire at most once per process; later triggers are logged and ignored
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - OS listeners feed the same `trigger` tests call directly

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One-shot shutdown request shared by the supervisor and signal listeners.
#[derive(Debug, Clone, Default)]
pub struct TerminationSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn trigger(&self, source: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::info!(source, "Termination signal already received, ignoring");
            return false;
        }
        tracing::info!(source, "Termination signal received");
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolve once the signal has fired.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// Listen for process signals on a background task.
    ///
    /// Registration happens before this returns, so a signal delivered right
    /// after the call is not lost.
    #[cfg(unix)]
    pub fn listen_os(&self) -> std::io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let this = self.clone();

        Ok(tokio::spawn(async move {
            loop {
                let source = tokio::select! {
                    Some(()) = terminate.recv() => "SIGTERM",
                    Some(()) = interrupt.recv() => "SIGINT",
                    else => break,
                };
                this.trigger(source);
            }
        }))
    }

    #[cfg(not(unix))]
    pub fn listen_os(&self) -> std::io::Result<JoinHandle<()>> {
        let this = self.clone();
        Ok(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                this.trigger("ctrl-c");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_exactly_once() {
        let signal = TerminationSignal::new();
        assert!(!signal.is_triggered());

        assert!(signal.trigger("test"));
        assert!(!signal.trigger("test"));
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn clones_observe_the_same_event() {
        let signal = TerminationSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        signal.trigger("test");
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn wait_blocks_until_triggered() {
        let signal = TerminationSignal::new();
        let result = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn os_listener_registers() {
        let signal = TerminationSignal::new();
        let listener = signal.listen_os().unwrap();
        assert!(!signal.is_triggered());
        listener.abort();
    }
}
