//! Handoff documents: the payload every tier transition must carry

use crate::escalation::state::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completeness failures of a handoff document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("handoff reason is empty")]
    EmptyReason,

    #[error("handoff assessment is empty")]
    EmptyAssessment,
}

/// Context handed from one tier to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffDocument {
    pub from_tier: Tier,
    pub to_tier: Tier,
    /// Why the item leaves `from_tier`
    pub reason: String,
    /// What the lower tier found out
    pub assessment: String,
    /// Constraints the receiving tier must respect
    #[serde(default)]
    pub constraints: Vec<String>,
    /// The lower tier's best recommendation so far, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl HandoffDocument {
    pub fn new(
        from_tier: Tier,
        to_tier: Tier,
        reason: impl Into<String>,
        assessment: impl Into<String>,
    ) -> Self {
        Self {
            from_tier,
            to_tier,
            reason: reason.into(),
            assessment: assessment.into(),
            constraints: Vec::new(),
            recommendations: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = String>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    pub fn with_recommendations(mut self, recommendations: serde_json::Value) -> Self {
        self.recommendations = Some(recommendations);
        self
    }

    /// Check the document is complete enough to justify a transition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reason.trim().is_empty() {
            return Err(ValidationError::EmptyReason);
        }
        if self.assessment.trim().is_empty() {
            return Err(ValidationError::EmptyAssessment);
        }
        Ok(())
    }
}
