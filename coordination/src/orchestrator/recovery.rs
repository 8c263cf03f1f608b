//! Recovery: per-item consultation budget and the recovery path log
//!
//! ```text
//! primary fails
//!   ├─ alternative 1 (peer at same tier)     → ok? done
//!   ├─ alternative 2 (peer / next tier)      → ok? done
//!   ├─ alternative 3                         → ok? done
//!   └─ DIRECT pass-through, fallback: true   (unless disabled → Exhausted)
//! ```
//!
//! The budget travels with one item's execution and is never shared, so a
//! fresh tier cannot grant fresh attempts.

use serde::{Deserialize, Serialize};

use crate::consultant::ConsultantId;
use crate::escalation::Tier;

use super::error::ConsultationError;

/// Most recovery alternatives tried before falling back
pub const MAX_RECOVERY_ALTERNATIVES: usize = 3;

/// Bounded count of consultant invocations for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptBudget {
    limit: u32,
    used: u32,
}

impl AttemptBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Spend one invocation; returns how many remain.
    pub fn consume(&mut self) -> Result<u32, ConsultationError> {
        if self.used >= self.limit {
            return Err(ConsultationError::BudgetExhausted { limit: self.limit });
        }
        self.used += 1;
        Ok(self.limit - self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

/// What happened at one recovery step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The route was tried and failed
    Failed,
    /// The route could not be tried
    Skipped,
    /// The route produced the accepted result
    Succeeded,
    /// DIRECT pass-through after every alternative failed
    Fallback,
}

/// One entry of a result's recovery path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStep {
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<ConsultantId>,
    pub outcome: RecoveryOutcome,
    pub detail: String,
}

impl RecoveryStep {
    pub fn new(
        tier: Tier,
        consultant_id: Option<&str>,
        outcome: RecoveryOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            tier,
            consultant_id: consultant_id.map(str::to_string),
            outcome,
            detail: detail.into(),
        }
    }
}
