//! JSON-file record store
//!
//! Layout: one directory per collection under the root, one pretty-printed
//! JSON file per record. Writes go to a temporary file first and are
//! renamed into place so readers never see a half-written record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::schema::{keys, ALL_COLLECTIONS};
use super::store::{RecordStore, StoreError, StoreResult};

/// Record store backed by a directory of JSON files
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if missing) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for collection in ALL_COLLECTIONS {
            tokio::fs::create_dir_all(root.join(collection)).await?;
        }
        debug!(root = %root.display(), "Opened JSON file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        if !ALL_COLLECTIONS.contains(&collection) {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }
        if !keys::is_valid(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(collection).join(format!("{}.json", key)))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        let path = self.record_path(collection, key)?;
        let bytes = serde_json::to_vec_pretty(&value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let path = self.record_path(collection, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Deserialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, serde_json::Value)>> {
        if !ALL_COLLECTIONS.contains(&collection) {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }
        let dir = self.root.join(collection);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Deserialization(format!("{}: {}", key, e)))?;
            entries.push((key, value));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        let path = self.record_path(collection, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::schema::{COL_CONSULTATIONS, COL_CONTEXT};

    #[tokio::test]
    async fn test_roundtrip_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        store
            .put(COL_CONTEXT, "project", serde_json::json!({"version": 3}))
            .await
            .unwrap();
        assert!(dir.path().join("context/project.json").exists());

        // A second handle on the same directory sees the record
        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        let value = reopened.get(COL_CONTEXT, "project").await.unwrap().unwrap();
        assert_eq!(value["version"], 3);
    }

    #[tokio::test]
    async fn test_list_ignores_temp_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store
            .put(COL_CONSULTATIONS, "ab12", serde_json::json!({"score": 0.9}))
            .await
            .unwrap();
        std::fs::write(dir.path().join("consultations/zz.json.tmp"), b"{").unwrap();

        let listed = store.list(COL_CONSULTATIONS).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "ab12");
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let err = store
            .put(COL_CONTEXT, "../escape", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_missing_and_delete() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.get(COL_CONTEXT, "nope").await.unwrap().is_none());
        store.delete(COL_CONTEXT, "nope").await.unwrap();
    }
}
