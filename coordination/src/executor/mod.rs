//! Parallel Dependency Executor: runs a plan group by group
//!
//! ```text
//! plan (cycles / unknown deps / duplicates → PlanError, nothing runs)
//!   │
//!   ▼
//! group 0 ──▶ spawn every item (≤ maxParallel at once) ──▶ wait for all
//!   │            critical failure? ── yes ──▶ remaining groups skipped, record failed
//!   ▼
//! group 1 ──▶ ...
//! ```
//!
//! A group never starts before the previous one has fully settled. An abort
//! stops scheduling; it does not interrupt items already running.

pub mod plan;

pub use plan::{ExecutionGroup, ExecutionPlan, PlanError};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::events::{EventKind, SharedEventBus};
use crate::orchestrator::{ErrorKind, ExecutionResult, SharedOrchestrator};
use crate::state::{put_record, schema, SharedRecordStore};
use crate::work_item::{WorkItem, WorkItemId};

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Every item completed
    Completed,
    /// Some non-critical items failed
    Partial,
    /// A critical item failed and the run was aborted
    Failed,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Audit record of one executed set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub groups: Vec<Vec<WorkItemId>>,
    pub results: Vec<ExecutionResult>,
    /// Items never started because of an abort
    pub skipped: Vec<WorkItemId>,
    pub status: RecordStatus,
}

impl ExecutionRecord {
    pub fn result(&self, item_id: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.work_item_id == item_id)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        (self.results.len() - self.failed_count()) as f64 / self.results.len() as f64
    }
}

/// Runs work-item sets through the orchestrator
pub struct ParallelExecutor {
    orchestrator: SharedOrchestrator,
    max_parallel: usize,
    events: SharedEventBus,
    store: Option<SharedRecordStore>,
}

impl ParallelExecutor {
    pub fn new(orchestrator: SharedOrchestrator) -> Self {
        Self {
            max_parallel: orchestrator.config().max_parallel.max(1),
            events: orchestrator.events().clone(),
            orchestrator,
            store: None,
        }
    }

    /// Persist execution records to `store`
    pub fn with_store(mut self, store: SharedRecordStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Plan and execute a set of work items.
    pub async fn execute_set(&self, items: Vec<WorkItem>) -> Result<ExecutionRecord, PlanError> {
        let plan = match ExecutionPlan::build(&items) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "Rejected execution plan");
                self.events.emit(
                    EventKind::BatchAborted,
                    json!({ "reason": e.to_string(), "kind": e.kind(), "started": false }),
                );
                return Err(e);
            }
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, items = items.len(), groups = plan.len(), "Executing work item set");

        let mut by_id: HashMap<WorkItemId, WorkItem> =
            items.into_iter().map(|i| (i.id.clone(), i)).collect();
        let mut results = Vec::new();
        let mut skipped = Vec::new();
        let mut aborted = false;

        for group in &plan.groups {
            if aborted {
                skipped.extend(group.items.iter().cloned());
                continue;
            }

            self.events.emit(
                EventKind::GroupStarted,
                json!({ "run_id": run_id, "depth": group.depth, "items": group.items }),
            );
            let members: Vec<WorkItem> = group
                .items
                .iter()
                .filter_map(|id| by_id.remove(id))
                .collect();
            let critical: HashMap<WorkItemId, bool> =
                members.iter().map(|i| (i.id.clone(), i.critical)).collect();

            let group_results = self.execute_group(members).await;

            let failed: Vec<&ExecutionResult> =
                group_results.iter().filter(|r| !r.is_success()).collect();
            let critical_failures: Vec<WorkItemId> = failed
                .iter()
                .filter(|r| critical.get(&r.work_item_id).copied().unwrap_or(false))
                .map(|r| r.work_item_id.clone())
                .collect();

            self.events.emit(
                EventKind::GroupCompleted,
                json!({
                    "run_id": run_id,
                    "depth": group.depth,
                    "succeeded": group_results.len() - failed.len(),
                    "failed": failed.len(),
                }),
            );
            results.extend(group_results);

            if !critical_failures.is_empty() {
                warn!(%run_id, depth = group.depth, critical = ?critical_failures, "Critical failure, aborting remaining groups");
                self.events.emit(
                    EventKind::BatchAborted,
                    json!({
                        "run_id": run_id,
                        "depth": group.depth,
                        "critical_failures": critical_failures,
                        "started": true,
                    }),
                );
                aborted = true;
            }
        }

        let any_failed = results.iter().any(|r| !r.is_success());
        let status = match (aborted, any_failed) {
            (true, _) => RecordStatus::Failed,
            (false, true) => RecordStatus::Partial,
            (false, false) => RecordStatus::Completed,
        };

        let record = ExecutionRecord {
            run_id,
            started_at,
            finished_at: Utc::now(),
            groups: plan.group_ids(),
            results,
            skipped,
            status,
        };
        info!(%run_id, %status, results = record.results.len(), skipped = record.skipped.len(), "Execution set finished");
        self.persist(&record).await;
        Ok(record)
    }

    /// Run one group with bounded concurrency and wait for every item.
    async fn execute_group(&self, members: Vec<WorkItem>) -> Vec<ExecutionResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles = Vec::with_capacity(members.len());

        for item in members {
            let orchestrator = self.orchestrator.clone();
            let semaphore = semaphore.clone();
            let item_id = item.id.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return ExecutionResult::failed(
                            &item.id,
                            crate::escalation::Tier::Direct,
                            ErrorKind::Consultation,
                            "executor shut down",
                        )
                    }
                };
                orchestrator.run_item(&item).await
            });
            handles.push((item_id, handle));
        }

        let (ids, handles): (Vec<WorkItemId>, Vec<_>) = handles.into_iter().unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, item_id)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(item_id = %item_id, error = %e, "Item task panicked");
                    ExecutionResult::failed(
                        &item_id,
                        crate::escalation::Tier::Direct,
                        ErrorKind::Consultation,
                        format!("task failed: {}", e),
                    )
                }
            })
            .collect()
    }

    async fn persist(&self, record: &ExecutionRecord) {
        let Some(store) = &self.store else {
            return;
        };
        let key = schema::keys::execution(&record.run_id);
        if let Err(e) = put_record(store.as_ref(), schema::COL_EXECUTIONS, &key, record).await {
            warn!(run_id = %record.run_id, error = %e, "Failed to persist execution record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::escalation::Tier;
    use crate::orchestrator::ExecutionOrchestrator;
    use crate::registry::ConsultantRegistry;
    use crate::router::KeywordClassifier;
    use crate::state::{MemoryRecordStore, RecordStore};

    fn executor() -> ParallelExecutor {
        // No consultants: every routed item falls back, DIRECT items pass through
        let orchestrator = ExecutionOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(ConsultantRegistry::new()),
            Arc::new(KeywordClassifier::standard().unwrap()),
        )
        .unwrap();
        ParallelExecutor::new(orchestrator.shared())
    }

    #[tokio::test]
    async fn test_runs_all_groups() {
        let record = executor()
            .execute_set(vec![
                WorkItem::new("x1", "rename the module"),
                WorkItem::new("x2", "rename the crate").depends_on("x1"),
            ])
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.groups.len(), 2);
        assert_eq!(record.results.len(), 2);
        assert_eq!(record.result("x2").unwrap().tier, Tier::Direct);
        assert_eq!(record.success_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_classification_failure_is_partial() {
        let record = executor()
            .execute_set(vec![
                WorkItem::new("x1", "   "),
                WorkItem::new("x2", "rename it").depends_on("x1"),
            ])
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.results.len(), 2);
        assert_eq!(
            record.result("x1").unwrap().error_kind(),
            Some(ErrorKind::Classification)
        );
    }

    #[tokio::test]
    async fn test_critical_failure_skips_later_groups() {
        let record = executor()
            .execute_set(vec![
                WorkItem::new("x1", " ").critical(),
                WorkItem::new("x2", "rename it").depends_on("x1"),
                WorkItem::new("x3", "rename more").depends_on("x2"),
            ])
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.results.len(), 1);
        assert_eq!(record.skipped, vec!["x2".to_string(), "x3".to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_rejected() {
        let err = executor()
            .execute_set(vec![
                WorkItem::new("A", "a").depends_on("B"),
                WorkItem::new("B", "b").depends_on("A"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::CyclicDependency { .. }));
    }

    #[tokio::test]
    async fn test_record_persisted() {
        let store = Arc::new(MemoryRecordStore::new());
        let record = executor()
            .with_store(store.clone())
            .execute_set(vec![WorkItem::new("x1", "rename")])
            .await
            .unwrap();

        let key = schema::keys::execution(&record.run_id);
        let saved = store.get(schema::COL_EXECUTIONS, &key).await.unwrap();
        assert!(saved.is_some());
    }
}
