//! In-process document store.
//!
//! Backs tests and local runs where no Firestore project is configured.
//! Implements the same merge semantics as the REST adapter and counts
//! writes so callers can observe whether an operation actually persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{Document, DocumentStore, StoreError};

/// In-memory `DocumentStore` keyed by `(collection, key)`.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<(String, String), Document>>,
    writes: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_merge` calls that reached the store.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.lock().await;
        Ok(documents
            .get(&(collection.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn set_merge(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().await;
        let entry = documents
            .entry((collection.to_owned(), key.to_owned()))
            .or_default();
        for (name, value) in fields {
            entry.insert(name, value);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
