//! Telemetry event types
//!
//! Every state transition, cache lookup and quality-gate outcome becomes one
//! `{type, data, timestamp}` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of telemetry events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CacheHit,
    CacheMiss,
    CacheEvicted,
    QualityGate,
    TierTransition,
    HandoffRejected,
    RecoveryAttempt,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    GroupStarted,
    GroupCompleted,
    BatchAborted,
    ContextUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::CacheMiss => "cache_miss",
            Self::CacheEvicted => "cache_evicted",
            Self::QualityGate => "quality_gate",
            Self::TierTransition => "tier_transition",
            Self::HandoffRejected => "handoff_rejected",
            Self::RecoveryAttempt => "recovery_attempt",
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionCompleted => "execution_completed",
            Self::ExecutionFailed => "execution_failed",
            Self::GroupStarted => "group_started",
            Self::GroupCompleted => "group_completed",
            Self::BatchAborted => "batch_aborted",
            Self::ContextUpdated => "context_updated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Work item the event refers to, if any
    pub fn item_id(&self) -> Option<&str> {
        self.data.get("item_id").and_then(|v| v.as_str())
    }
}
