//! Execution results: one per work item per run

use serde::{Deserialize, Serialize};

use super::error::ErrorKind;
use super::recovery::RecoveryStep;
use crate::consultant::{ConsultantId, Recommendation};
use crate::escalation::Tier;
use crate::quality::QualityAssessment;
use crate::work_item::WorkItemId;

/// Terminal status of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Error attached to a failed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub work_item_id: WorkItemId,
    pub status: ResultStatus,
    pub consultant_id: Option<ConsultantId>,
    /// Tier that produced the result (DIRECT for pass-through and fallback)
    pub tier: Tier,
    pub recommendation: Option<Recommendation>,
    pub quality_assessment: Option<QualityAssessment>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    /// Best-effort pass-through after recovery ran out of routes
    #[serde(default)]
    pub fallback: bool,
    /// Accepted below the acceptable threshold
    #[serde(default)]
    pub needs_review: bool,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub recovery_path: Vec<RecoveryStep>,
    #[serde(default)]
    pub tiers_visited: Vec<Tier>,
    #[serde(default)]
    pub annotations: Vec<String>,
    /// Context version after this item's context update
    #[serde(default)]
    pub context_version: u64,
}

impl ExecutionResult {
    pub fn completed(
        work_item_id: impl Into<WorkItemId>,
        tier: Tier,
        consultant_id: Option<ConsultantId>,
        recommendation: Recommendation,
    ) -> Self {
        Self {
            work_item_id: work_item_id.into(),
            status: ResultStatus::Completed,
            consultant_id,
            tier,
            recommendation: Some(recommendation),
            quality_assessment: None,
            duration_ms: 0,
            error: None,
            fallback: false,
            needs_review: false,
            cache_hit: false,
            recovery_path: Vec::new(),
            tiers_visited: Vec::new(),
            annotations: Vec::new(),
            context_version: 0,
        }
    }

    pub fn failed(
        work_item_id: impl Into<WorkItemId>,
        tier: Tier,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            work_item_id: work_item_id.into(),
            status: ResultStatus::Failed,
            consultant_id: None,
            tier,
            recommendation: None,
            quality_assessment: None,
            duration_ms: 0,
            error: Some(ResultError {
                kind,
                message: message.into(),
            }),
            fallback: false,
            needs_review: false,
            cache_hit: false,
            recovery_path: Vec::new(),
            tiers_visited: Vec::new(),
            annotations: Vec::new(),
            context_version: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
