//! Service runtime: accept loop, per-connection serving, and stop control.
//!
//! # Responsibilities
//! - Wrap the route table with the shared middleware stack
//! - Accept connections and serve each on its own task (HTTP/1.1 and HTTP/2)
//! - Graceful stop: refuse new work, let in-flight requests finish
//! - Forced stop: drop every connection and handler task at once
//!
//! # Design Decisions
//! - Every task the runtime starts (accept loop, connections, HTTP/2 streams)
//!   is spawned through one `TaskTracker`, so "stopped" means all of them ended
//! - Connection and stream tasks race an abort token; forced stop cancels it
//! - The drain gate answers 503 to any request that reaches the router after
//!   draining began, so no handler starts once shutdown is underway
//! - HTTP/1 connections get a header read timeout, so a client that stalls
//!   mid-headers cannot keep a graceful stop from completing

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;
use hyper::rt::Executor;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::TimeoutConfig;
use crate::http::request::RequestIdLayer;
use crate::http::response::ApiError;
use crate::lifecycle::shutdown::Stoppable;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;

/// Lifecycle of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Constructed, not yet accepting.
    Idle,
    /// Accepting and serving.
    Serving,
    /// No longer accepting; in-flight work may still run.
    Draining,
    /// Every task ended.
    Stopped,
}

/// Fatal serve-loop failure.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("accept loop failed: {0}")]
    Accept(#[source] ListenerError),
}

/// Stop control shared between the runtime and the shutdown coordinator.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    /// Cancelled when graceful stop begins.
    draining: CancellationToken,
    /// Cancelled when forced stop begins.
    abort: CancellationToken,
    tasks: TaskTracker,
    state: watch::Sender<RuntimeState>,
    connections: ConnectionTracker,
}

impl RuntimeHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                draining: CancellationToken::new(),
                abort: CancellationToken::new(),
                tasks: TaskTracker::new(),
                state: watch::Sender::new(RuntimeState::Idle),
                connections: ConnectionTracker::new(),
            }),
        }
    }

    pub fn state(&self) -> RuntimeState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RuntimeState> {
        self.inner.state.subscribe()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.is_cancelled()
    }

    /// Currently open client connections.
    pub fn active_connections(&self) -> u64 {
        self.inner.connections.active_count()
    }

    /// Stop accepting, let in-flight requests finish, resolve when every task ended.
    pub async fn graceful_stop(&self) {
        self.begin_drain();
        tracing::info!(
            active_connections = self.active_connections(),
            "Draining in-flight requests"
        );

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.finish();
    }

    /// Abort every connection and handler task, resolve once they are dropped.
    pub async fn force_stop(&self) {
        self.begin_drain();
        tracing::warn!(
            active_connections = self.active_connections(),
            tasks = self.inner.tasks.len(),
            "Aborting in-flight requests"
        );

        self.inner.abort.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.finish();
    }

    fn begin_drain(&self) {
        self.inner.draining.cancel();
        self.inner.state.send_if_modified(|state| match state {
            RuntimeState::Idle | RuntimeState::Serving => {
                *state = RuntimeState::Draining;
                true
            }
            _ => false,
        });
    }

    fn finish(&self) {
        self.inner.state.send_replace(RuntimeState::Stopped);
        tracing::info!("Service runtime stopped");
    }
}

#[async_trait]
impl Stoppable for RuntimeHandle {
    async fn graceful_stop(&self) {
        RuntimeHandle::graceful_stop(self).await
    }

    async fn force_stop(&self) {
        RuntimeHandle::force_stop(self).await
    }
}

/// Spawns connection and HTTP/2 stream tasks onto the tracker, each racing the abort token.
#[derive(Debug, Clone)]
struct ConnectionExecutor {
    tasks: TaskTracker,
    abort: CancellationToken,
}

impl<F> Executor<F> for ConnectionExecutor
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, future: F) {
        let abort = self.abort.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = abort.cancelled() => {}
                _ = future => {}
            }
        });
    }
}

/// The request-serving loop and its handlers.
pub struct ServiceRuntime {
    router: Router,
    handle: RuntimeHandle,
    executor: ConnectionExecutor,
    header_read_timeout: Duration,
}

impl ServiceRuntime {
    /// Wrap `router` with the drain gate, metrics, timeout, request ID and trace layers.
    #[allow(deprecated)]
    pub fn new(router: Router, timeouts: &TimeoutConfig) -> Self {
        let handle = RuntimeHandle::new();
        let executor = ConnectionExecutor {
            tasks: handle.inner.tasks.clone(),
            abort: handle.inner.abort.clone(),
        };

        let router = router
            .layer(middleware::from_fn_with_state(handle.clone(), reject_when_draining))
            .layer(middleware::from_fn(record_request))
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http());

        Self {
            router,
            handle,
            executor,
            header_read_timeout: timeouts.header_read_timeout(),
        }
    }

    /// Stop control for this runtime.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Start serving on a background task.
    ///
    /// The runtime is `Serving` when this returns. The task resolves with `Ok`
    /// after a stop, or with the accept error that ended the loop.
    pub fn spawn(self, listener: Arc<Listener>) -> JoinHandle<Result<(), RuntimeError>> {
        self.handle.inner.state.send_if_modified(|state| {
            if *state == RuntimeState::Idle {
                *state = RuntimeState::Serving;
                true
            } else {
                false
            }
        });

        let tasks = self.handle.inner.tasks.clone();
        tasks.spawn(self.accept_loop(listener))
    }

    async fn accept_loop(self, listener: Arc<Listener>) -> Result<(), RuntimeError> {
        let draining = self.handle.inner.draining.clone();
        tracing::info!(address = %listener.local_addr(), "Server listening");

        let result = loop {
            tokio::select! {
                biased;
                _ = draining.cancelled() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.serve_connection(stream, peer, permit),
                    Err(e) if e.is_transient() => {
                        tracing::warn!(error = %e, "Transient accept error");
                    }
                    Err(e) => break Err(RuntimeError::Accept(e)),
                },
            }
        };

        match &result {
            Ok(()) => tracing::info!("Stopped accepting connections"),
            Err(e) => tracing::error!(error = %e, "Accept loop failed"),
        }
        result
    }

    fn serve_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.handle.inner.connections.track();
        let router = self.router.clone();
        let draining = self.handle.inner.draining.clone();
        let executor = self.executor.clone();
        let header_read_timeout = self.header_read_timeout;

        self.executor.execute(async move {
            let _permit = permit;
            let connection_id = guard.id();

            let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer));
                router.clone().oneshot(request)
            });

            let mut builder = auto::Builder::new(executor);
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(header_read_timeout);
            let connection = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(connection);

            let mut shutting_down = false;
            loop {
                tokio::select! {
                    result = connection.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "Connection ended with error");
                        }
                        break;
                    }
                    _ = draining.cancelled(), if !shutting_down => {
                        shutting_down = true;
                        connection.as_mut().graceful_shutdown();
                    }
                }
            }

            drop(guard);
        });
    }
}

/// Refuse requests that arrive after draining began.
async fn reject_when_draining(
    State(handle): State<RuntimeHandle>,
    request: Request,
    next: Next,
) -> Response {
    if handle.is_draining() {
        tracing::debug!(path = %request.uri().path(), "Rejected request during shutdown");
        return ApiError::Draining.into_response();
    }
    next.run(request).await
}

async fn record_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;

    fn runtime() -> ServiceRuntime {
        let router = Router::new().route("/", get(|| async { "hello" }));
        ServiceRuntime::new(router, &TimeoutConfig::default())
    }

    #[tokio::test]
    async fn gate_admits_while_serving() {
        let runtime = runtime();
        let response = runtime
            .router
            .clone()
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gate_rejects_after_drain() {
        let runtime = runtime();
        let handle = runtime.handle();
        handle.graceful_stop().await;

        let response = runtime
            .router
            .clone()
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn stop_before_start_reaches_stopped() {
        let runtime = runtime();
        let handle = runtime.handle();
        assert_eq!(handle.state(), RuntimeState::Idle);

        handle.graceful_stop().await;
        assert_eq!(handle.state(), RuntimeState::Stopped);
    }

    #[tokio::test]
    async fn spawn_after_stop_exits_without_serving() {
        let runtime = runtime();
        let handle = runtime.handle();
        handle.graceful_stop().await;

        let listener = Arc::new(
            Listener::bind(&crate::config::ListenerConfig {
                bind_address: "127.0.0.1:0".into(),
                max_connections: 4,
            })
            .await
            .unwrap(),
        );
        let result = runtime.spawn(listener).await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn forced_stop_aborts_tracked_tasks() {
        let runtime = runtime();
        let handle = runtime.handle();
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let flag = finished.clone();
        runtime.executor.execute(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        tokio::time::timeout(Duration::from_secs(2), handle.force_stop())
            .await
            .expect("forced stop should not wait for the sleeper");
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(handle.state(), RuntimeState::Stopped);
    }
}
