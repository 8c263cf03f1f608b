//! RocksDB-backed record store
//!
//! One column family per collection, values stored as JSON bytes.

use std::path::PathBuf;

use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};

use super::schema::ALL_COLLECTIONS;
use super::store::{RecordStore, StoreError, StoreResult};

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Persistent record store on RocksDB
pub struct RocksRecordStore {
    db: DB,
    path: PathBuf,
}

impl RocksRecordStore {
    /// Open or create a store at the given path
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_COLLECTIONS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn cf(&self, collection: &str) -> StoreResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }
}

#[async_trait]
impl RecordStore for RocksRecordStore {
    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        let cf = self.cf(collection)?;
        let bytes =
            serde_json::to_vec(&value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let cf = self.cf(collection)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, serde_json::Value)>> {
        let cf = self.cf(collection)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, bytes) = item?;
            let Ok(key) = String::from_utf8(key.to_vec()) else {
                continue;
            };
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        let cf = self.cf(collection)?;
        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }
}
