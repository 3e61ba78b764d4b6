//! In-memory record store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::{Record, RecordStore, StoreError};

/// A process-local store keyed by primary key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, i32>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, a: &str) -> Option<Record> {
        self.records.get(a).map(|r| Record {
            a: r.key().clone(),
            b: *r.value(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &Record) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        match self.records.entry(record.a.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(record.a.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.b);
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        tracing::debug!(records = self.records.len(), "Memory store closed");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(a: &str, b: i32) -> Record {
        Record { a: a.to_string(), b }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let store = MemoryStore::new();
        store.insert(&record("k1", 7)).await.unwrap();

        assert_eq!(store.get("k1"), Some(record("k1", 7)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn primary_key_is_unique() {
        let store = MemoryStore::new();
        store.insert(&record("k1", 1)).await.unwrap();

        let err = store.insert(&record("k1", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref key) if key == "k1"));
        assert_eq!(store.get("k1").unwrap().b, 1);
    }

    #[tokio::test]
    async fn closed_store_rejects_work() {
        let store = MemoryStore::new();
        store.close().await.unwrap();

        assert!(matches!(store.insert(&record("k", 1)).await, Err(StoreError::Closed)));
        assert!(matches!(store.close().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn concurrent_inserts_all_land() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(&record(&format!("k{i}"), i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.len(), 32);
    }
}
