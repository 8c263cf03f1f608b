//! In-memory record store, used by tests and ephemeral runs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::schema::ALL_COLLECTIONS;
use super::store::{RecordStore, StoreError, StoreResult};

/// Record store keeping everything in process memory
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, BTreeMap<String, serde_json::Value>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_collection(collection: &str) -> StoreResult<()> {
        if ALL_COLLECTIONS.contains(&collection) {
            Ok(())
        } else {
            Err(StoreError::UnknownCollection(collection.to_string()))
        }
    }

    /// Number of records in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        Self::check_collection(collection)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<serde_json::Value>> {
        Self::check_collection(collection)?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, serde_json::Value)>> {
        Self::check_collection(collection)?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        Self::check_collection(collection)?;
        if let Some(c) = self.collections.write().await.get_mut(collection) {
            c.remove(key);
        }
        Ok(())
    }
}
