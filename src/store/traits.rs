//! `KeyValueStore`, the string key/value contract behind intro persistence.

use async_trait::async_trait;

use crate::error::StorageError;

/// Backend-agnostic string key/value store.
///
/// One instance backs durable values, another backs session-scoped values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete every value (ends a session for session-scoped stores).
    async fn clear(&self) -> Result<(), StorageError>;
}
