//! Context store: single writer path, lock-free snapshots for readers
//!
//! Readers take an `Arc` snapshot and never observe a partial merge.
//! Writers serialize through one async mutex; each merge swaps in a new
//! snapshot with a higher version.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{ContextUpdate, ProjectContext};
use crate::events::{EventKind, SharedEventBus};
use crate::state::{get_record, put_record, schema, SharedRecordStore, StoreError};

/// Error type for context operations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;

/// Shared reference to ContextStore
pub type SharedContextStore = Arc<ContextStore>;

/// Process-wide project context
pub struct ContextStore {
    current: RwLock<Arc<ProjectContext>>,
    writer: Mutex<()>,
    store: Option<SharedRecordStore>,
    events: Option<SharedEventBus>,
}

impl ContextStore {
    /// Create an empty, in-memory context store
    pub fn new() -> Self {
        Self::from_context(ProjectContext::new())
    }

    pub fn from_context(context: ProjectContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
            writer: Mutex::new(()),
            store: None,
            events: None,
        }
    }

    /// Load the persisted context (or start empty) and persist future merges
    pub async fn load(store: SharedRecordStore) -> ContextResult<Self> {
        let context: ProjectContext = get_record(
            store.as_ref(),
            schema::COL_CONTEXT,
            schema::keys::PROJECT_CONTEXT,
        )
        .await?
        .unwrap_or_default();
        info!(version = context.version, "Project context loaded");

        let mut ctx_store = Self::from_context(context);
        ctx_store.store = Some(store);
        Ok(ctx_store)
    }

    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn shared(self) -> SharedContextStore {
        Arc::new(self)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<ProjectContext> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    /// Whether a context observed at `seen_version` has since been superseded
    pub fn is_stale(&self, seen_version: u64) -> bool {
        self.version() > seen_version
    }

    /// Merge an update and return the resulting version.
    ///
    /// The in-memory snapshot is swapped before persistence runs, so a
    /// persistence error still leaves the merge visible to readers.
    pub async fn apply(&self, update: ContextUpdate) -> ContextResult<u64> {
        let _guard = self.writer.lock().await;

        let base = self.snapshot();
        let Some(next) = base.merged(&update) else {
            debug!(version = base.version, "Context update changed nothing");
            return Ok(base.version);
        };
        let version = next.version;
        let next = Arc::new(next);

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next.clone();

        if let Some(events) = &self.events {
            events.emit(
                EventKind::ContextUpdated,
                serde_json::json!({
                    "version": version,
                    "source": update.source,
                    "decisions": update.decisions.len(),
                    "constraints": update.constraints.len(),
                    "objectives": update.objectives.len(),
                }),
            );
        }

        if let Some(store) = &self.store {
            if let Err(e) = put_record(
                store.as_ref(),
                schema::COL_CONTEXT,
                schema::keys::PROJECT_CONTEXT,
                next.as_ref(),
            )
            .await
            {
                warn!(version, error = %e, "Failed to persist project context");
                return Err(e.into());
            }
        }

        debug!(version, "Context updated");
        Ok(version)
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
