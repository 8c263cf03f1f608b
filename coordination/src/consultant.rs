//! Consultant capability: the pluggable boundary that produces recommendations
//!
//! The core never looks inside a recommendation body. It only reads the
//! numeric score and the improvement suggestions the quality gate needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ProjectContext;
use crate::escalation::Tier;
use crate::work_item::WorkItem;

/// Identifier a consultant is registered under.
pub type ConsultantId = String;

/// Output of a consultation, opaque apart from score and suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Domain content, never inspected by the core
    pub body: serde_json::Value,
    /// Quality score in `[0, 1]`
    pub score: f64,
    /// Suggestions the consultant believes would raise the score
    #[serde(default)]
    pub improvements: Vec<String>,
    /// Suggestions already applied to this recommendation
    #[serde(default)]
    pub applied_improvements: Vec<String>,
    /// Number of improvement passes applied
    #[serde(default)]
    pub revision: u32,
}

impl Recommendation {
    pub fn new(body: serde_json::Value, score: f64) -> Self {
        Self {
            body,
            score: score.clamp(0.0, 1.0),
            improvements: Vec::new(),
            applied_improvements: Vec::new(),
            revision: 0,
        }
    }

    pub fn with_improvements(mut self, improvements: impl IntoIterator<Item = String>) -> Self {
        self.improvements.extend(improvements);
        self
    }

    /// Pass-through recommendation for items handled without a consultant.
    pub fn pass_through(item: &WorkItem) -> Self {
        Self::new(
            serde_json::json!({
                "pass_through": true,
                "work_item": item.id,
                "description": item.description,
            }),
            0.0,
        )
    }

    /// A copy with `applied` marked as applied and the revision bumped.
    ///
    /// The score is left untouched; re-scoring is domain knowledge.
    pub fn revised(&self, applied: &[String]) -> Self {
        let mut next = self.clone();
        next.applied_improvements.extend(applied.iter().cloned());
        next.improvements.retain(|s| !applied.contains(s));
        next.revision += 1;
        next
    }

    /// Whether at least one improvement pass has been applied.
    pub fn is_revised(&self) -> bool {
        self.revision > 0
    }
}

/// A consultant declaring itself insufficient for the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    /// Requested tier; defaults to the next tier up
    #[serde(default)]
    pub target_tier: Option<Tier>,
    pub reason: String,
    pub assessment: String,
}

/// Everything a consultant returns for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationOutput {
    pub recommendation: Recommendation,
    #[serde(default)]
    pub handoff_required: Option<HandoffRequest>,
}

impl ConsultationOutput {
    pub fn accepted(recommendation: Recommendation) -> Self {
        Self {
            recommendation,
            handoff_required: None,
        }
    }

    pub fn with_handoff(mut self, handoff: HandoffRequest) -> Self {
        self.handoff_required = Some(handoff);
        self
    }
}

/// Failures a consultant call can produce
#[derive(Debug, thiserror::Error)]
pub enum ConsultantFailure {
    #[error("consultant unavailable: {0}")]
    Unavailable(String),

    #[error("consultant timed out after {0}ms")]
    Timeout(u64),

    #[error("consultant rejected the item: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A consultant that can be asked about a work item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Consultant: Send + Sync {
    /// Produce a recommendation for `item` given the current project context.
    async fn consult(
        &self,
        item: &WorkItem,
        context: &ProjectContext,
    ) -> Result<ConsultationOutput, ConsultantFailure>;

    /// Apply improvement suggestions locally.
    ///
    /// The default marks the suggestions applied without re-scoring.
    fn improve(&self, recommendation: &Recommendation, improvements: &[String]) -> Recommendation {
        recommendation.revised(improvements)
    }
}
