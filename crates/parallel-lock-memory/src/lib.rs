//! In-memory (single process) lock store for local development and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parallel_lock_core::error::LockResult;
use parallel_lock_core::traits::LockStore;
use tracing::trace;

type Records = HashMap<(String, String), u64>;

/// In-memory lock store.
///
/// Clones share the same records, so one store can stand in for the shared
/// backend of several controllers in a test.
#[derive(Clone, Debug, Default)]
pub struct MemoryLockStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryLockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the acquisition timestamp stored for a record.
    pub fn get(&self, namespace: &str, subkey: &str) -> Option<u64> {
        self.records()
            .get(&(namespace.to_string(), subkey.to_string()))
            .copied()
    }

    /// Number of records held across all namespaces.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns true if no record is held.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl LockStore for MemoryLockStore {
    async fn set_if_absent(&self, namespace: &str, subkey: &str, value: u64) -> LockResult<bool> {
        let mut records = self.records();
        let key = (namespace.to_string(), subkey.to_string());
        if records.contains_key(&key) {
            trace!(namespace, subkey, "record already present");
            return Ok(false);
        }
        records.insert(key, value);
        trace!(namespace, subkey, value, "record created");
        Ok(true)
    }

    async fn delete(&self, namespace: &str, subkey: &str) -> LockResult<()> {
        self.records()
            .remove(&(namespace.to_string(), subkey.to_string()));
        trace!(namespace, subkey, "record deleted");
        Ok(())
    }

    async fn exists(&self, namespace: &str, subkey: &str) -> LockResult<bool> {
        Ok(self
            .records()
            .contains_key(&(namespace.to_string(), subkey.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_and_delete() {
        let store = MemoryLockStore::new();

        // First set creates the record
        assert!(store.set_if_absent("parallel", "job", 42).await.unwrap());
        assert_eq!(store.get("parallel", "job"), Some(42));

        // Second set leaves the original value in place
        assert!(!store.set_if_absent("parallel", "job", 43).await.unwrap());
        assert_eq!(store.get("parallel", "job"), Some(42));
        assert!(store.exists("parallel", "job").await.unwrap());

        store.delete("parallel", "job").await.unwrap();
        assert!(!store.exists("parallel", "job").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let store = MemoryLockStore::new();
        assert!(store.set_if_absent("billing", "job", 1).await.unwrap());
        assert!(store.set_if_absent("reports", "job", 2).await.unwrap());
        assert_eq!(store.len(), 2);

        store.delete("billing", "job").await.unwrap();
        assert!(!store.exists("billing", "job").await.unwrap());
        assert!(store.exists("reports", "job").await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let store = MemoryLockStore::new();
        let other = store.clone();
        assert!(store.set_if_absent("parallel", "job", 1).await.unwrap());
        assert!(!other.set_if_absent("parallel", "job", 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_absent_record_is_ok() {
        let store = MemoryLockStore::new();
        assert!(store.delete("parallel", "missing").await.is_ok());
    }
}
