//! In-memory state store for development and testing
//!
//! Snapshots live in an `Arc<RwLock<HashMap>>`; data is lost on drop.
//! Run ids go through the same sanitization as the file backend so tests
//! exercise identical key semantics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::file::sanitize_run_id;
use crate::traits::StateStore;

/// Thread-safe in-memory [`StateStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    snapshots: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots. Useful in tests.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }

    /// Drop all snapshots. Test isolation helper.
    pub async fn clear(&self) {
        self.snapshots.write().await.clear();
    }

    fn key(run_id: &str) -> Result<String> {
        let key = sanitize_run_id(run_id);
        if key.is_empty() {
            return Err(StoreError::InvalidRunId(run_id.to_string()));
        }
        Ok(key)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, run_id: &str, snapshot: &Value) -> Result<()> {
        let key = Self::key(run_id)?;
        self.snapshots.write().await.insert(key, snapshot.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Value>> {
        let key = Self::key(run_id)?;
        Ok(self.snapshots.read().await.get(&key).cloned())
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        let key = Self::key(run_id)?;
        self.snapshots.write().await.remove(&key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryStateStore::new();
        store.save("r1", &json!({"a": 1})).await.unwrap();
        assert_eq!(store.load("r1").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = MemoryStateStore::new();
        store.save("r1", &json!(1)).await.unwrap();
        store.save("r2", &json!(2)).await.unwrap();

        store.delete("r1").await.unwrap();
        assert!(store.load("r1").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);

        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sanitized_keys_share_a_slot() {
        let store = MemoryStateStore::new();
        store.save("a/b", &json!(1)).await.unwrap();
        store.save("ab", &json!(2)).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.load("a/b").await.unwrap(), Some(json!(2)));
    }
}
