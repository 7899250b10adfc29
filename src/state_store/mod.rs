//! State storage for the wizard engine.
//!
//! The engine never owns run state. It reads and writes a handful of
//! string keys through the [`StateStore`] trait, so a run can live in a
//! web session, a database row or plain memory. Concrete implementations:
//!
//! - [`MemoryStateStore`]: Thread-safe in-memory storage for testing/development
//! - `SqliteStateStore` (feature `sqlite`): file-backed storage that
//!   survives process restarts
//!
//! # Example
//!
//! ```
//! use stepwise::{MemoryStateStore, StateStore};
//!
//! # async fn example() -> stepwise::Result<()> {
//! let mut store = MemoryStateStore::new();
//!
//! store.set("__wizard.repetitionIndex", &serde_json::json!(0)).await?;
//! assert!(store.has("__wizard.repetitionIndex").await?);
//! # Ok(())
//! # }
//! ```

mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStateStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStateStore;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// A flat key-value store holding persisted wizard runs.
///
/// Keys are plain strings scoped by a run-specific prefix; values are JSON.
/// Only single-key atomicity is assumed. The engine performs unsynchronized
/// read-modify-write sequences, so callers must not process two exchanges
/// for the same run concurrently.
///
/// # Object Safety
///
/// This trait is object-safe, allowing for dynamic dispatch with
/// `dyn StateStore`.
///
/// # Examples
///
/// ```
/// use stepwise::StateStore;
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use std::collections::HashMap;
///
/// struct SessionStore {
///     data: HashMap<String, Value>,
/// }
///
/// #[async_trait]
/// impl StateStore for SessionStore {
///     async fn has(&self, key: &str) -> stepwise::Result<bool> {
///         Ok(self.data.contains_key(key))
///     }
///
///     async fn get(&self, key: &str) -> stepwise::Result<Option<Value>> {
///         Ok(self.data.get(key).cloned())
///     }
///
///     async fn set(&mut self, key: &str, value: &Value) -> stepwise::Result<()> {
///         self.data.insert(key.to_string(), value.clone());
///         Ok(())
///     }
///
///     async fn remove(&mut self, key: &str) -> stepwise::Result<()> {
///         self.data.remove(key);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns true if a value is stored under `key`.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Retrieves the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&mut self, key: &str, value: &JsonValue) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&mut self, key: &str) -> Result<()>;

    /// Retrieves the value under `key`, or `default` when absent.
    async fn get_or(&self, key: &str, default: JsonValue) -> Result<JsonValue> {
        Ok(self.get(key).await?.unwrap_or(default))
    }
}
