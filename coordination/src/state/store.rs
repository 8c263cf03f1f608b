//! Record store boundary
//!
//! The core persists consultation records, the project context and
//! execution records as serialized JSON values through get/put/list
//! operations only. The storage medium is the implementation's concern.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Error type for record store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a record store
pub type SharedRecordStore = Arc<dyn RecordStore>;

/// Key/value persistence over named collections
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a value, replacing any previous value under `key`
    async fn put(&self, collection: &str, key: &str, value: serde_json::Value)
        -> StoreResult<()>;

    /// Get a value by key
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<serde_json::Value>>;

    /// List all entries of a collection, ordered by key
    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, serde_json::Value)>>;

    /// Delete a value; deleting a missing key is not an error
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()>;
}

/// Serialize and store a typed record
pub async fn put_record<T: Serialize>(
    store: &dyn RecordStore,
    collection: &str,
    key: &str,
    record: &T,
) -> StoreResult<()> {
    let value =
        serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    store.put(collection, key, value).await
}

/// Load and deserialize a typed record
pub async fn get_record<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(collection, key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Deserialization(e.to_string())),
        None => Ok(None),
    }
}

/// Load every record of a collection, skipping entries that fail to parse
pub async fn list_records<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
) -> StoreResult<Vec<(String, T)>> {
    let entries = store.list(collection).await?;
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(record) => Some((key, record)),
            Err(e) => {
                tracing::warn!(collection, key = %key, error = %e, "Skipping unreadable record");
                None
            }
        })
        .collect())
}
