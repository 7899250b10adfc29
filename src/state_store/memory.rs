//! In-memory state store implementation.
//!
//! This module provides [`MemoryStateStore`], a thread-safe in-memory
//! implementation of [`StateStore`] suitable for testing and development.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::StateStore;

/// An in-memory implementation of [`StateStore`].
///
/// Entries are kept in key order. The map sits behind `Arc<RwLock<...>>`,
/// so clones share the same entries, the way several handles share one
/// web session.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryStateStore, StateStore};
///
/// # async fn example() -> stepwise::Result<()> {
/// let mut store = MemoryStateStore::new();
/// store.set("__wizard.steps", &serde_json::json!(["a", "b"])).await?;
///
/// let steps = store.get("__wizard.steps").await?;
/// assert!(steps.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    entries: Arc<RwLock<BTreeMap<String, JsonValue>>>,
}

impl MemoryStateStore {
    /// Creates a new, empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns every stored key in order.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Returns a copy of every stored entry.
    ///
    /// Useful for comparing store contents in tests.
    pub async fn snapshot(&self) -> BTreeMap<String, JsonValue> {
        self.entries.read().await.clone()
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &JsonValue) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let mut store = MemoryStateStore::new();
        store.set("run.data", &json!({"a": {"k": 1}})).await.unwrap();

        assert!(store.has("run.data").await.unwrap());
        assert_eq!(
            store.get("run.data").await.unwrap(),
            Some(json!({"a": {"k": 1}}))
        );
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStateStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(!store.has("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let mut store = MemoryStateStore::new();
        store.set("k", &json!(1)).await.unwrap();
        store.set("k", &json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let mut store = MemoryStateStore::new();
        store.set("k", &json!(1)).await.unwrap();
        store.remove("k").await.unwrap();
        assert!(!store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_ordered() {
        let mut store = MemoryStateStore::new();
        store.set("b", &json!(1)).await.unwrap();
        store.set("a", &json!(1)).await.unwrap();
        store.set("c", &json!(1)).await.unwrap();
        assert_eq!(store.keys().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_store_is_clone() {
        let mut store1 = MemoryStateStore::new();
        let store2 = store1.clone();

        store1.set("shared", &json!(true)).await.unwrap();

        // Changes visible through clone
        assert!(store2.has("shared").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let mut store = MemoryStateStore::new();
        store.set("a", &json!(1)).await.unwrap();
        store.set("b", &json!(2)).await.unwrap();
        assert_eq!(store.len().await, 2);

        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = MemoryStateStore::new();
        let mut handles = Vec::new();

        // Spawn 10 tasks writing different runs
        for i in 0..10 {
            let mut store_clone = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("run-{}.data", i);
                store_clone.set(&key, &json!({})).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 10);
    }
}
