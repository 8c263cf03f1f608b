//! Escalation Engine: the single transition function of the tier ladder
//!
//! States are the four tiers plus an implicit terminal state (accepted
//! result). Every upward move needs a valid [`HandoffDocument`]; a rejected
//! document leaves the item where it is and annotates it. All decisions are
//! deterministic and involve no consultant calls.
//!
//! ```text
//! DIRECT ──▶ TIER_1 ──▶ TIER_2 ──▶ TIER_3 ─┐
//!                                    ▲     │ quality failure
//!                                    └─────┘ (saturated, accepted for review)
//! ```

use crate::escalation::handoff::{HandoffDocument, ValidationError};
use crate::escalation::state::{EscalationState, EscalationTrigger, Tier};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Errors raised by the transition function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscalationError {
    #[error("invalid handoff document: {0}")]
    InvalidHandoff(#[from] ValidationError),

    #[error("no tier above {0}")]
    BeyondCeiling(Tier),

    #[error("transition from {from} to {to} is not upward")]
    NotUpward { from: Tier, to: Tier },

    #[error("transition from {from} to {to} skips a tier")]
    SkippedTier { from: Tier, to: Tier },

    #[error("handoff document starts at {document} but item is at {current}")]
    TierMismatch { current: Tier, document: Tier },

    #[error("item already accepted")]
    AlreadyTerminal,
}

impl EscalationError {
    /// Whether the failure came from document completeness rather than tier rules.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidHandoff(_))
    }
}

/// Result of an accepted transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransitionOutcome {
    /// Item moved one tier up
    Escalated { from: Tier, to: Tier },
    /// Item is at the ceiling; the self-loop leaves it there
    Saturated { tier: Tier },
}

/// Deterministic tier ladder state machine
#[derive(Debug, Clone, Default)]
pub struct EscalationEngine;

impl EscalationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Prepare a handoff document for the next step up from the item's tier.
    ///
    /// At the ceiling the draft targets the ceiling itself (self-loop).
    pub fn draft(
        &self,
        state: &EscalationState,
        reason: impl Into<String>,
        assessment: impl Into<String>,
    ) -> HandoffDocument {
        let to = state.current_tier.next().unwrap_or(state.current_tier);
        HandoffDocument::new(state.current_tier, to, reason, assessment)
    }

    /// Apply a transition request.
    ///
    /// On error the state keeps its tier; validation failures are also
    /// recorded as an annotation on the item.
    pub fn transition(
        &self,
        state: &mut EscalationState,
        trigger: EscalationTrigger,
        document: &HandoffDocument,
    ) -> Result<TransitionOutcome, EscalationError> {
        if state.terminal {
            return Err(EscalationError::AlreadyTerminal);
        }

        if let Err(e) = document.validate() {
            warn!(item_id = %state.item_id, tier = %state.current_tier, error = %e, "Handoff rejected");
            state.annotate(format!(
                "{} handoff at {} rejected: {}",
                trigger, state.current_tier, e
            ));
            return Err(e.into());
        }

        let current = state.current_tier;
        if document.from_tier != current {
            return Err(EscalationError::TierMismatch {
                current,
                document: document.from_tier,
            });
        }

        if current.is_ceiling() {
            return match (trigger, document.to_tier) {
                (EscalationTrigger::Handoff | EscalationTrigger::QualityGate, Tier::Tier3) => {
                    state.annotate(format!("saturated at {}: {}", current, document.reason));
                    debug!(item_id = %state.item_id, "Escalation saturated at ceiling");
                    Ok(TransitionOutcome::Saturated { tier: current })
                }
                _ => Err(EscalationError::BeyondCeiling(current)),
            };
        }

        let to = document.to_tier;
        if to <= current {
            return Err(EscalationError::NotUpward { from: current, to });
        }
        if Some(to) != current.next() {
            return Err(EscalationError::SkippedTier { from: current, to });
        }

        state.record_transition(to, trigger, document.reason.clone());
        debug!(item_id = %state.item_id, from = %current, to = %to, %trigger, "Tier transition");
        Ok(TransitionOutcome::Escalated { from: current, to })
    }
}
