//! State persistence for consultation records, context and execution history
//!
//! The core talks to storage only through the [`RecordStore`] trait:
//!
//! - `consultations`: cache records keyed by fingerprint
//! - `context`: the project context snapshot
//! - `executions`: execution records keyed by run id
//!
//! Backends: [`MemoryRecordStore`] for tests and ephemeral runs,
//! [`JsonFileStore`] for a directory of JSON files, and `RocksRecordStore`
//! behind the `heavy-state` feature.
//!
//! # Usage
//!
//! ```ignore
//! use tiered_coordination::state::{JsonFileStore, schema};
//!
//! let store = JsonFileStore::open("./tiered-state").await?;
//! store.put(schema::COL_CONTEXT, "project", serde_json::json!({})).await?;
//! ```

pub mod file;
pub mod memory;
#[cfg(feature = "heavy-state")]
pub mod rocks;
pub mod schema;
pub mod store;

pub use file::JsonFileStore;
pub use memory::MemoryRecordStore;
#[cfg(feature = "heavy-state")]
pub use rocks::RocksRecordStore;
pub use store::{
    get_record, list_records, put_record, RecordStore, SharedRecordStore, StoreError, StoreResult,
};
