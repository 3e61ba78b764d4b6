//! Backing store subsystem.
//!
//! # Data Flow
//! ```text
//! StoreConfig
//!     → StoreConnector::connect (acquisition step)
//!     → Arc<dyn RecordStore> (shared by every handler)
//!     → RecordStore::close (shutdown, after the runtime stopped)
//! ```
//!
//! # Design Decisions
//! - Handlers share one pool without extra locking; backends are Send + Sync
//! - Closing is explicit so shutdown can order it and report failures
//! - The runtime is built before the store exists, so handlers reach it
//!   through a `StoreSlot` filled once at the end of acquisition

pub mod memory;
pub mod mysql;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// A row of `table_records`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key.
    pub a: String,
    pub b: i32,
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not establish the initial connection.
    #[error("failed to connect to store at {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// A query failed.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Primary key already present.
    #[error("record '{0}' already exists")]
    Duplicate(String),

    /// The store was closed.
    #[error("store is closed")]
    Closed,

    /// Acquisition finished without a store.
    #[error("store is not connected")]
    NotConnected,
}

/// Persistent record storage shared by all request handlers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one record.
    async fn insert(&self, record: &Record) -> Result<(), StoreError>;

    /// Close the store. Every later call fails with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Opens a store from configuration.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError>;
}

/// Connector that picks the backend named in the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendConnector;

#[async_trait]
impl StoreConnector for BackendConnector {
    async fn connect(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
        match config.backend {
            StoreBackend::Mysql => Ok(Arc::new(MySqlStore::connect(config).await?)),
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Late-bound handle to the store, shared between acquisition and the handlers.
#[derive(Clone, Default)]
pub struct StoreSlot {
    inner: Arc<OnceLock<Arc<dyn RecordStore>>>,
}

impl StoreSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that is already filled.
    pub fn with_store(store: Arc<dyn RecordStore>) -> Self {
        let slot = Self::new();
        slot.fill(store);
        slot
    }

    /// Fill the slot. Returns false if it was already filled.
    pub fn fill(&self, store: Arc<dyn RecordStore>) -> bool {
        self.inner.set(store).is_ok()
    }

    pub fn get(&self) -> Result<&Arc<dyn RecordStore>, StoreError> {
        self.inner.get().ok_or(StoreError::NotConnected)
    }
}

impl std::fmt::Debug for StoreSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSlot")
            .field("backend", &self.inner.get().map(|s| s.backend()))
            .finish()
    }
}
