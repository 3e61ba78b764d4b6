//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use record_service::config::schema::TimeoutConfig;
use record_service::config::{ListenerConfig, StoreBackend, StoreConfig};
use record_service::http::{RuntimeError, RuntimeHandle, ServiceRuntime};
use record_service::lifecycle::ServiceProcess;
use record_service::lifecycle::shutdown::Releasable;
use record_service::net::Listener;
use record_service::observability::LogSink;
use record_service::store::{MemoryStore, RecordStore, StoreConnector, StoreError};
use record_service::ServiceConfig;

/// A runtime serving `router` on a loopback port, with real resources behind it.
pub struct TestServer {
    pub address: SocketAddr,
    pub handle: RuntimeHandle,
    pub serving: JoinHandle<Result<(), RuntimeError>>,
    pub listener: Option<Arc<Listener>>,
    pub store: Arc<MemoryStore>,
    pub log_sink: LogSink,
    _log_dir: TempDir,
}

impl TestServer {
    pub async fn start(router: Router) -> Self {
        let log_dir = tempfile::tempdir().unwrap();
        let log_sink = LogSink::new();
        log_sink.open(log_dir.path(), "test").unwrap();

        let timeouts = TimeoutConfig {
            request_secs: 120,
            header_read_secs: 1,
        };
        let runtime = ServiceRuntime::new(router, &timeouts);
        let listener = Arc::new(
            Listener::bind(&ListenerConfig {
                bind_address: "127.0.0.1:0".into(),
                max_connections: 64,
            })
            .await
            .unwrap(),
        );
        let handle = runtime.handle();
        let serving = runtime.spawn(listener.clone());

        Self {
            address: listener.local_addr(),
            handle,
            serving,
            listener: Some(listener),
            store: Arc::new(MemoryStore::new()),
            log_sink,
            _log_dir: log_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    /// Socket, store and log sink, in release order. The server gives up its
    /// own reference to the socket.
    pub fn take_resources(&mut self) -> Vec<Box<dyn Releasable>> {
        let listener = self.listener.take().expect("resources already taken");
        ServiceProcess::resources(listener, self.store.clone(), self.log_sink.clone())
    }
}

/// Client without connection pooling, so every request opens its own connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap()
}

/// Service configuration for a loopback port, memory store and scratch log directory.
pub fn service_config(log_dir: &std::path::Path, grace_period_secs: u64) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.logging.directory = log_dir.to_string_lossy().into_owned();
    config.store.backend = StoreBackend::Memory;
    config.shutdown.grace_period_secs = grace_period_secs;
    config.timeouts.header_read_secs = 1;
    config
}

/// Connector handing out one shared in-memory store the test can inspect.
#[derive(Clone, Default)]
pub struct SharedMemoryConnector {
    pub store: Arc<MemoryStore>,
    pub connects: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreConnector for SharedMemoryConnector {
    async fn connect(&self, _config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}
