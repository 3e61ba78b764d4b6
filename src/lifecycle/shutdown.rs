//! Shutdown coordination.
//!
//! # State Machine
//! ```text
//! Running ──signal──▶ GracefulStopping ──drained before deadline──▶ ResourcesReleasing ──▶ Stopped
//!                            │                                           ▲
//!                            └──deadline──▶ ForcedStopping ──────────────┘
//! ```
//!
//! # Design Decisions
//! - Graceful stop races the grace deadline through `tokio::time::timeout`;
//!   the losing future is dropped, nothing is left running
//! - Force stop has no deadline of its own
//! - Release steps run in the order given; a failing step is logged and the
//!   next one still runs
//! - Runs at most once; Stopped is terminal

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::observability::LogSinkError;
use crate::store::StoreError;

/// The two ways to stop a serving runtime.
#[async_trait]
pub trait Stoppable: Send + Sync {
    /// Stop accepting and resolve once in-flight work finished on its own.
    async fn graceful_stop(&self);

    /// Abort in-flight work and resolve once it has been dropped.
    async fn force_stop(&self);
}

/// A resource released during shutdown.
#[async_trait]
pub trait Releasable: Send {
    fn name(&self) -> &'static str;

    async fn release(&mut self) -> Result<(), ReleaseError>;
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("{0} was already released")]
    AlreadyReleased(&'static str),

    #[error("listening socket still has {0} other owner(s)")]
    ListenerShared(usize),

    #[error("store close failed: {0}")]
    Store(#[from] StoreError),

    #[error("log sink close failed: {0}")]
    LogSink(#[from] LogSinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    GracefulStopping,
    ForcedStopping,
    ResourcesReleasing,
    Stopped,
}

/// Which path stopped the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPath {
    Graceful,
    Forced,
}

impl StopPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopPath::Graceful => "graceful",
            StopPath::Forced => "forced",
        }
    }
}

#[derive(Debug)]
pub struct ReleaseOutcome {
    pub resource: &'static str,
    pub result: Result<(), ReleaseError>,
}

/// What a completed shutdown did.
#[derive(Debug)]
pub struct ShutdownReport {
    pub path: StopPath,
    pub releases: Vec<ReleaseOutcome>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Resource names in the order they were released.
    pub fn release_order(&self) -> Vec<&'static str> {
        self.releases.iter().map(|r| r.resource).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReleaseOutcome> {
        self.releases.iter().filter(|r| r.result.is_err())
    }
}

/// Drives the two-phase stop and the ordered release.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    grace_period: Duration,
    started: AtomicBool,
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            started: AtomicBool::new(false),
            state: watch::Sender::new(ShutdownState::Running),
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Stop `runtime`, then release `resources` in order.
    ///
    /// Returns `None` without doing anything if a shutdown already ran.
    pub async fn shutdown(
        &self,
        runtime: &dyn Stoppable,
        mut resources: Vec<Box<dyn Releasable>>,
    ) -> Option<ShutdownReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::info!(state = ?self.state(), "Shutdown already ran, ignoring");
            return None;
        }

        let start = Instant::now();
        self.transition(ShutdownState::GracefulStopping);
        tracing::info!(
            grace_period_secs = self.grace_period.as_secs_f64(),
            "Stopping server gracefully"
        );

        let path = match tokio::time::timeout(self.grace_period, runtime.graceful_stop()).await {
            Ok(()) => {
                tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Server stopped gracefully");
                StopPath::Graceful
            }
            Err(_) => {
                self.transition(ShutdownState::ForcedStopping);
                tracing::warn!(
                    grace_period_secs = self.grace_period.as_secs_f64(),
                    "Force stopping server due to timeout"
                );
                runtime.force_stop().await;
                StopPath::Forced
            }
        };
        metrics::record_shutdown(path.as_str());

        self.transition(ShutdownState::ResourcesReleasing);
        let mut releases = Vec::with_capacity(resources.len());
        for resource in resources.iter_mut() {
            let name = resource.name();
            let result = resource.release().await;
            match &result {
                Ok(()) => tracing::info!(resource = name, "Resource released"),
                Err(e) => {
                    tracing::error!(resource = name, error = %e, "Failed to release resource");
                    metrics::record_release_failure(name);
                }
            }
            releases.push(ReleaseOutcome {
                resource: name,
                result,
            });
        }

        self.transition(ShutdownState::Stopped);
        let report = ShutdownReport {
            path,
            releases,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            path = path.as_str(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            failed_releases = report.failures().count(),
            "Server shutdown complete"
        );
        Some(report)
    }

    fn transition(&self, next: ShutdownState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = ?previous, to = ?next, "Shutdown state changed");
    }
}
