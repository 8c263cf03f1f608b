//! Tiered Coordination Library
//!
//! Routes work items through a tiered consultation pipeline:
//! - Complexity classification and routing to a consultant tier
//! - Memoized consultations keyed by content fingerprint
//! - Quality gating with one local improvement pass
//! - A four-tier escalation ladder driven by handoffs and gate failures
//! - Dependency-aware parallel execution of whole work-item sets
//!
//! # Pipeline
//!
//! ```text
//! ParallelExecutor ──▶ ExecutionOrchestrator ──▶ Router ──▶ ConsultationCache
//!                                │                              │ miss
//!                                │                              ▼
//!                                │                         Consultant
//!                                │                              │
//!                                ▼                              ▼
//!                         ContextStore ◀── EscalationEngine ◀── QualityGate
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tiered_coordination::{
//!     ConsultantRegistry, ExecutionOrchestrator, KeywordClassifier, OrchestratorConfig,
//!     ParallelExecutor, Tier,
//! };
//!
//! let registry = ConsultantRegistry::new().with("architect", Tier::Tier2, consultant)?;
//! let orchestrator = ExecutionOrchestrator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(registry),
//!     Arc::new(KeywordClassifier::standard()?),
//! )?;
//! let record = ParallelExecutor::new(orchestrator.shared()).execute_set(items).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod cache;
pub mod config;
pub mod consultant;
pub mod context;
pub mod escalation;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod quality;
pub mod registry;
pub mod router;
pub mod state;
pub mod work_item;

// Re-export the core types
pub use cache::{CacheStats, ConsultationCache, ConsultationRecord, Fingerprint};
pub use config::{ConfigError, OrchestratorConfig, QualityThresholds, TtlAdjustment};
pub use consultant::{
    Consultant, ConsultantFailure, ConsultantId, ConsultationOutput, HandoffRequest,
    Recommendation,
};
pub use context::{ContextStore, ContextUpdate, ProjectContext, SharedContextStore};
pub use escalation::{
    EscalationEngine, EscalationError, EscalationState, EscalationTrigger, HandoffDocument,
    Tier, TransitionOutcome, ValidationError,
};
pub use events::{EventBus, EventHistory, EventKind, JsonlSink, SharedEventBus, TelemetryEvent};
pub use executor::{ExecutionPlan, ExecutionRecord, ParallelExecutor, PlanError, RecordStatus};
pub use orchestrator::{
    ConsultationError, ErrorKind, ExecutionOrchestrator, ExecutionResult, OrchestrationError,
    RecoveryStep, ResultStatus, SharedOrchestrator,
};
pub use quality::{QualityAssessment, QualityGate, QualityVerdict};
pub use registry::{ConsultantHealth, ConsultantRegistry, RegistryError};
pub use router::{
    ClassificationError, ComplexityAssessment, ComplexityClassifier, KeywordClassifier,
    KeywordLists, Router, RoutingDecision,
};
pub use state::{JsonFileStore, MemoryRecordStore, RecordStore, SharedRecordStore, StoreError};
pub use work_item::{Priority, WorkItem, WorkItemId};
