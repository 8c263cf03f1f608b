//! Orchestration errors

use serde::{Deserialize, Serialize};

use crate::consultant::ConsultantId;
use crate::escalation::{EscalationError, Tier, ValidationError};
use crate::router::ClassificationError;

/// Serializable error classification reported on failed results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Classification,
    Validation,
    Consultation,
    Escalation,
    CyclicDependency,
    Exhausted,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Validation => write!(f, "validation"),
            Self::Consultation => write!(f, "consultation"),
            Self::Escalation => write!(f, "escalation"),
            Self::CyclicDependency => write!(f, "cyclic_dependency"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// A consultant could not produce an output. Feeds the recovery chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsultationError {
    #[error("no consultant registered for {0}")]
    NoConsultant(Tier),

    #[error("unknown consultant: {0}")]
    UnknownConsultant(ConsultantId),

    #[error("consultant {consultant} unavailable: {message}")]
    Unavailable {
        consultant: ConsultantId,
        message: String,
    },

    #[error("consultant {consultant} failed: {message}")]
    Failed {
        consultant: ConsultantId,
        message: String,
    },

    #[error("consultant {consultant} timed out after {timeout_ms}ms")]
    Timeout {
        consultant: ConsultantId,
        timeout_ms: u64,
    },

    #[error("consultation budget of {limit} calls exhausted")]
    BudgetExhausted { limit: u32 },
}

/// Errors surfaced by the execution orchestrator
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("handoff rejected: {0}")]
    Validation(ValidationError),

    #[error(transparent)]
    Consultation(#[from] ConsultationError),

    #[error("escalation failed: {0}")]
    Escalation(EscalationError),

    #[error("recovery exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: String },
}

impl From<EscalationError> for OrchestrationError {
    fn from(e: EscalationError) -> Self {
        match e {
            EscalationError::InvalidHandoff(v) => Self::Validation(v),
            other => Self::Escalation(other),
        }
    }
}

impl OrchestrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classification(_) => ErrorKind::Classification,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Consultation(_) => ErrorKind::Consultation,
            Self::Escalation(_) => ErrorKind::Escalation,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
        }
    }
}

/// Result type for orchestration
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handoff_maps_to_validation() {
        let err: OrchestrationError =
            EscalationError::InvalidHandoff(ValidationError::EmptyReason).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: OrchestrationError = EscalationError::BeyondCeiling(Tier::Tier3).into();
        assert_eq!(err.kind(), ErrorKind::Escalation);
    }

    #[test]
    fn test_error_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(ErrorKind::CyclicDependency).unwrap(),
            serde_json::json!("cyclic_dependency")
        );
        assert_eq!(ErrorKind::Exhausted.to_string(), "exhausted");
    }
}
