//! Execution Orchestrator: one work item from routing to accepted result
//!
//! # Per-attempt sequence
//!
//! ```text
//! RoutingDecision
//!   │ DIRECT ──────────────────────────────────▶ pass-through result
//!   ▼
//! cache lookup ── hit ─────────────────────────▶ cached result
//!   │ miss
//!   ▼
//! consult (budget, retries, timeout)
//!   │ handoff requested ──▶ transition ──▶ re-route at next tier ─┐
//!   ▼                                                             │
//! quality gate                                                    │
//!   │ accept ──▶ cache store ──▶ context update ──▶ result        │
//!   │ improve ─▶ apply improvements once, re-evaluate             │
//!   │ escalate ▶ transition ──▶ re-route at next tier ────────────┤
//!   ▼                                                             │
//! consultant error ──▶ alternatives ──▶ DIRECT fallback           │
//!                                                    ◀────────────┘
//! ```
//!
//! Escalation only climbs, so the loop runs at most four tiers deep. Every
//! consultant call spends from a per-item [`AttemptBudget`].

pub mod error;
pub mod recovery;
pub mod result;

pub use error::{ConsultationError, ErrorKind, OrchestrationError, OrchestrationResult};
pub use recovery::{AttemptBudget, RecoveryOutcome, RecoveryStep, MAX_RECOVERY_ALTERNATIVES};
pub use result::{ExecutionResult, ResultError, ResultStatus};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::{ConsultationCache, Fingerprint, SharedConsultationCache};
use crate::config::{ConfigResult, OrchestratorConfig};
use crate::consultant::{ConsultantFailure, ConsultationOutput, Recommendation};
use crate::context::{ContextStore, ContextUpdate, ProjectContext, SharedContextStore};
use crate::escalation::{
    EscalationEngine, EscalationState, EscalationTrigger, HandoffDocument, Tier,
    TransitionOutcome,
};
use crate::events::{EventBus, EventKind, SharedEventBus};
use crate::quality::{QualityAssessment, QualityGate, QualityVerdict};
use crate::registry::{ConsultantEntry, ConsultantRegistry};
use crate::router::{ComplexityClassifier, RouteAlternative, Router, RoutingDecision};
use crate::work_item::WorkItem;

/// Shared reference to ExecutionOrchestrator
pub type SharedOrchestrator = Arc<ExecutionOrchestrator>;

/// Mutable bookkeeping of one item's execution
struct ExecutionTrace {
    state: EscalationState,
    budget: AttemptBudget,
    recovery_path: Vec<RecoveryStep>,
    started: Instant,
}

impl ExecutionTrace {
    fn new(item_id: &str, tier: Tier, budget: u32) -> Self {
        Self {
            state: EscalationState::new(item_id, tier),
            budget: AttemptBudget::new(budget),
            recovery_path: Vec::new(),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// How one consultation at a tier ended
enum TierOutcome {
    Accepted(Box<ExecutionResult>),
    Escalated(Tier),
}

/// Sequences cache, consultant, quality gate and escalation for one item
pub struct ExecutionOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<ConsultantRegistry>,
    router: Router,
    classifier: Arc<dyn ComplexityClassifier>,
    cache: SharedConsultationCache,
    gate: QualityGate,
    engine: EscalationEngine,
    context: SharedContextStore,
    events: SharedEventBus,
}

impl ExecutionOrchestrator {
    /// Build an orchestrator; an inconsistent config is rejected here.
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<ConsultantRegistry>,
        classifier: Arc<dyn ComplexityClassifier>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            router: Router::new(registry.clone()),
            cache: ConsultationCache::new(&config).shared(),
            gate: QualityGate::new(config.quality_thresholds),
            engine: EscalationEngine::new(),
            context: ContextStore::new().shared(),
            events: EventBus::new().shared(),
            config,
            registry,
            classifier,
        })
    }

    pub fn with_cache(mut self, cache: SharedConsultationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_context(mut self, context: SharedContextStore) -> Self {
        self.context = context;
        self
    }

    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn shared(self) -> SharedOrchestrator {
        Arc::new(self)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn cache(&self) -> &SharedConsultationCache {
        &self.cache
    }

    pub fn context(&self) -> &SharedContextStore {
        &self.context
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Classify and route an item.
    pub fn plan_route(&self, item: &WorkItem) -> OrchestrationResult<RoutingDecision> {
        let assessment = self.classifier.classify(item)?;
        debug!(item_id = %item.id, tier = %assessment.tier, score = assessment.score, rationale = %assessment.rationale, "Classified");
        Ok(self
            .router
            .route(item, &assessment, &self.context.snapshot()))
    }

    /// Execute an item along an existing routing decision.
    pub async fn execute(
        &self,
        item: &WorkItem,
        decision: RoutingDecision,
    ) -> OrchestrationResult<ExecutionResult> {
        self.emit_started(item, decision.tier);
        let mut trace = ExecutionTrace::new(
            &item.id,
            decision.tier,
            self.config.max_consultations_per_item,
        );
        let outcome = self.execute_traced(item, decision, &mut trace).await;
        if let Err(e) = &outcome {
            self.emit_failed(item, &trace, e);
        }
        outcome
    }

    /// Classify, route and execute an item; errors become a failed result.
    pub async fn run_item(&self, item: &WorkItem) -> ExecutionResult {
        let decision = match self.plan_route(item) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Classification failed");
                let trace = ExecutionTrace::new(&item.id, Tier::Direct, 0);
                self.emit_failed(item, &trace, &e);
                let mut result =
                    ExecutionResult::failed(&item.id, Tier::Direct, e.kind(), e.to_string());
                result.duration_ms = trace.elapsed_ms();
                return result;
            }
        };

        self.emit_started(item, decision.tier);
        let mut trace = ExecutionTrace::new(
            &item.id,
            decision.tier,
            self.config.max_consultations_per_item,
        );
        match self.execute_traced(item, decision, &mut trace).await {
            Ok(result) => result,
            Err(e) => {
                self.emit_failed(item, &trace, &e);
                let mut result = ExecutionResult::failed(
                    &item.id,
                    trace.state.current_tier,
                    e.kind(),
                    e.to_string(),
                );
                result.duration_ms = trace.elapsed_ms();
                result.recovery_path = trace.recovery_path;
                result.tiers_visited = trace.state.visited;
                result.annotations = trace.state.annotations;
                result.context_version = self
                    .update_context(
                        item,
                        ContextUpdate::from_source(&item.id)
                            .decision(format!("{} failed ({}): {}", item.id, e.kind(), e)),
                    )
                    .await;
                result
            }
        }
    }

    async fn execute_traced(
        &self,
        item: &WorkItem,
        mut decision: RoutingDecision,
        trace: &mut ExecutionTrace,
    ) -> OrchestrationResult<ExecutionResult> {
        let mut route = (decision.consultant_id.clone(), decision.tier);
        let mut pending: Option<VecDeque<RouteAlternative>> = None;

        loop {
            let (consultant_id, tier) = route.clone();
            if !tier.is_consulted() {
                let result = self.pass_through(item, false);
                return Ok(self.finish(item, result, trace).await);
            }

            let outcome = match consultant_id.as_deref() {
                Some(id) => self.consult_at(item, id, tier, trace).await,
                None => Err(ConsultationError::NoConsultant(tier).into()),
            };

            match outcome {
                Ok(TierOutcome::Accepted(mut result)) => {
                    if pending.is_some() {
                        trace.recovery_path.push(RecoveryStep::new(
                            tier,
                            consultant_id.as_deref(),
                            RecoveryOutcome::Succeeded,
                            "accepted",
                        ));
                    }
                    result.fallback = false;
                    return Ok(self.finish(item, *result, trace).await);
                }
                Ok(TierOutcome::Escalated(to)) => {
                    decision = self
                        .router
                        .route_at(&item.id, to, &self.context.snapshot());
                    route = (decision.consultant_id.clone(), decision.tier);
                    pending = None;
                }
                Err(OrchestrationError::Consultation(e)) => {
                    warn!(item_id = %item.id, %tier, error = %e, "Consultation failed, recovering");
                    trace.recovery_path.push(RecoveryStep::new(
                        tier,
                        consultant_id.as_deref(),
                        RecoveryOutcome::Failed,
                        e.to_string(),
                    ));
                    let queue = pending.get_or_insert_with(|| {
                        decision
                            .alternatives
                            .iter()
                            .take(MAX_RECOVERY_ALTERNATIVES)
                            .cloned()
                            .collect()
                    });
                    match self.next_alternative(item, queue, trace) {
                        Some(next) => route = next,
                        None => return self.fallback(item, trace, e).await,
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pop alternatives until one can be tried from the item's current tier.
    fn next_alternative(
        &self,
        item: &WorkItem,
        queue: &mut VecDeque<RouteAlternative>,
        trace: &mut ExecutionTrace,
    ) -> Option<(Option<String>, Tier)> {
        while let Some(alt) = queue.pop_front() {
            let current = trace.state.current_tier;
            if alt.tier < current || alt.consultant_id.is_none() {
                trace.recovery_path.push(RecoveryStep::new(
                    alt.tier,
                    alt.consultant_id.as_deref(),
                    RecoveryOutcome::Skipped,
                    format!("not reachable from {}", current),
                ));
                continue;
            }

            if alt.tier > current {
                let document = HandoffDocument::new(
                    current,
                    alt.tier,
                    format!("recovery: {}", alt.reason),
                    format!("no consultant at {} produced a result", current),
                )
                .with_constraints(item.constraints.iter().cloned());
                match self
                    .engine
                    .transition(&mut trace.state, EscalationTrigger::Recovery, &document)
                {
                    Ok(outcome) => self.emit_transition(item, EscalationTrigger::Recovery, &outcome),
                    Err(e) => {
                        trace.recovery_path.push(RecoveryStep::new(
                            alt.tier,
                            alt.consultant_id.as_deref(),
                            RecoveryOutcome::Skipped,
                            e.to_string(),
                        ));
                        continue;
                    }
                }
            }

            self.events.emit(
                EventKind::RecoveryAttempt,
                json!({
                    "item_id": item.id,
                    "tier": alt.tier,
                    "consultant_id": alt.consultant_id,
                    "reason": alt.reason,
                }),
            );
            return Some((alt.consultant_id, alt.tier));
        }
        None
    }

    /// Last resort once every alternative failed.
    async fn fallback(
        &self,
        item: &WorkItem,
        trace: &mut ExecutionTrace,
        last: ConsultationError,
    ) -> OrchestrationResult<ExecutionResult> {
        if !self.config.direct_fallback {
            return Err(OrchestrationError::Exhausted {
                attempts: trace.recovery_path.len(),
                last: last.to_string(),
            });
        }

        warn!(item_id = %item.id, error = %last, "Recovery exhausted, falling back to pass-through");
        trace.recovery_path.push(RecoveryStep::new(
            Tier::Direct,
            None,
            RecoveryOutcome::Fallback,
            last.to_string(),
        ));
        let result = self.pass_through(item, true);
        Ok(self.finish(item, result, trace).await)
    }

    fn pass_through(&self, item: &WorkItem, fallback: bool) -> ExecutionResult {
        let mut result = ExecutionResult::completed(
            &item.id,
            Tier::Direct,
            None,
            Recommendation::pass_through(item),
        );
        result.fallback = fallback;
        result
    }

    /// One consultation at `tier`: cache, consultant, handoff, quality gate.
    async fn consult_at(
        &self,
        item: &WorkItem,
        consultant_id: &str,
        tier: Tier,
        trace: &mut ExecutionTrace,
    ) -> OrchestrationResult<TierOutcome> {
        let entry = self
            .registry
            .get(consultant_id)
            .ok_or_else(|| ConsultationError::UnknownConsultant(consultant_id.to_string()))?;
        let context = self.context.snapshot();
        let fingerprint = Fingerprint::compute(consultant_id, item, &context);

        if let Some(record) = self.cache.get(&fingerprint).await {
            debug!(item_id = %item.id, consultant = consultant_id, fingerprint = %fingerprint.short(), "Cache hit");
            self.events.emit(
                EventKind::CacheHit,
                json!({
                    "item_id": item.id,
                    "consultant_id": consultant_id,
                    "fingerprint": fingerprint,
                    "access_count": record.access_count,
                }),
            );
            let assessment = self.gate.evaluate(&record.recommendation, item);
            let mut result = ExecutionResult::completed(
                &item.id,
                tier,
                Some(record.consultant_id),
                record.recommendation,
            );
            result.quality_assessment = Some(assessment);
            result.cache_hit = true;
            return Ok(TierOutcome::Accepted(Box::new(result)));
        }
        self.events.emit(
            EventKind::CacheMiss,
            json!({
                "item_id": item.id,
                "consultant_id": consultant_id,
                "fingerprint": fingerprint,
            }),
        );

        let output = self.invoke(entry, item, &context, trace).await?;

        if let Some(handoff) = &output.handoff_required {
            let target = handoff
                .target_tier
                .or_else(|| tier.next())
                .unwrap_or(tier);
            let document =
                HandoffDocument::new(tier, target, &handoff.reason, &handoff.assessment)
                    .with_constraints(
                        item.constraints
                            .iter()
                            .cloned()
                            .chain(context.constraint_texts()),
                    )
                    .with_recommendations(
                        serde_json::to_value(&output.recommendation).unwrap_or_default(),
                    );

            match self.apply_transition(item, trace, EscalationTrigger::Handoff, &document)? {
                TransitionOutcome::Escalated { to, .. } => {
                    info!(item_id = %item.id, from = %tier, %to, "Consultant handed off");
                    return Ok(TierOutcome::Escalated(to));
                }
                TransitionOutcome::Saturated { .. } => {
                    debug!(item_id = %item.id, "Handoff at ceiling, gating current recommendation");
                }
            }
        }

        self.gate_recommendation(item, entry, tier, fingerprint, output.recommendation, trace)
            .await
    }

    /// Quality gate with a single local improvement pass.
    async fn gate_recommendation(
        &self,
        item: &WorkItem,
        entry: &ConsultantEntry,
        tier: Tier,
        fingerprint: Fingerprint,
        recommendation: Recommendation,
        trace: &mut ExecutionTrace,
    ) -> OrchestrationResult<TierOutcome> {
        let mut recommendation = recommendation;
        let mut assessment = self.gate.evaluate(&recommendation, item);
        self.emit_gate(item, tier, &assessment);

        if assessment.verdict() == QualityVerdict::Improve {
            recommendation = entry
                .consultant
                .improve(&recommendation, &assessment.improvements);
            assessment = self.gate.evaluate(&recommendation, item);
            self.emit_gate(item, tier, &assessment);
        }

        match assessment.verdict() {
            QualityVerdict::Accept => {
                let record = self.cache.record(
                    fingerprint,
                    entry.id.clone(),
                    recommendation.clone(),
                    assessment.score,
                );
                self.cache.put(record).await;
                Ok(self.accepted(item, entry, tier, recommendation, assessment, false))
            }
            QualityVerdict::Improve => {
                debug!(item_id = %item.id, score = assessment.score, "Accepted for review after improvement");
                Ok(self.accepted(item, entry, tier, recommendation, assessment, true))
            }
            QualityVerdict::Escalate => {
                let document = self
                    .engine
                    .draft(
                        &trace.state,
                        assessment.escalation.reasons.join("; "),
                        format!(
                            "score {:.2} after {} improvement pass(es)",
                            assessment.score, recommendation.revision
                        ),
                    )
                    .with_constraints(item.constraints.iter().cloned())
                    .with_recommendations(
                        serde_json::to_value(&recommendation).unwrap_or_default(),
                    );

                match self.apply_transition(
                    item,
                    trace,
                    EscalationTrigger::QualityGate,
                    &document,
                )? {
                    TransitionOutcome::Escalated { to, .. } => Ok(TierOutcome::Escalated(to)),
                    TransitionOutcome::Saturated { .. } => {
                        info!(item_id = %item.id, score = assessment.score, "Quality failure at ceiling, accepting for review");
                        Ok(self.accepted(item, entry, tier, recommendation, assessment, true))
                    }
                }
            }
        }
    }

    fn accepted(
        &self,
        item: &WorkItem,
        entry: &ConsultantEntry,
        tier: Tier,
        recommendation: Recommendation,
        assessment: QualityAssessment,
        needs_review: bool,
    ) -> TierOutcome {
        let mut result =
            ExecutionResult::completed(&item.id, tier, Some(entry.id.clone()), recommendation);
        result.quality_assessment = Some(assessment);
        result.needs_review = needs_review;
        TierOutcome::Accepted(Box::new(result))
    }

    fn apply_transition(
        &self,
        item: &WorkItem,
        trace: &mut ExecutionTrace,
        trigger: EscalationTrigger,
        document: &HandoffDocument,
    ) -> OrchestrationResult<TransitionOutcome> {
        match self.engine.transition(&mut trace.state, trigger, document) {
            Ok(outcome) => {
                self.emit_transition(item, trigger, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.events.emit(
                    EventKind::HandoffRejected,
                    json!({
                        "item_id": item.id,
                        "tier": trace.state.current_tier,
                        "trigger": trigger,
                        "error": e.to_string(),
                    }),
                );
                Err(e.into())
            }
        }
    }

    /// Call a consultant with retries, a timeout and the item's budget.
    async fn invoke(
        &self,
        entry: &ConsultantEntry,
        item: &WorkItem,
        context: &ProjectContext,
        trace: &mut ExecutionTrace,
    ) -> Result<ConsultationOutput, ConsultationError> {
        let timeout_ms = self.config.execution_timeout_ms;
        let mut last_error = None;

        for attempt in 1..=self.config.retry_attempts.max(1) {
            let remaining = trace.budget.consume()?;
            let started = Instant::now();
            let call = entry.consultant.consult(item, context);

            let error = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
                Ok(Ok(output)) => {
                    self.registry
                        .record_success(&entry.id, started.elapsed().as_millis() as u64);
                    return Ok(output);
                }
                Ok(Err(ConsultantFailure::Unavailable(message))) => {
                    self.registry.mark_unavailable(&entry.id, message.clone());
                    self.registry.record_failure(&entry.id, message.clone());
                    // No point retrying a consultant that reports itself down
                    return Err(ConsultationError::Unavailable {
                        consultant: entry.id.clone(),
                        message,
                    });
                }
                Ok(Err(failure)) => {
                    self.registry.record_failure(&entry.id, failure.to_string());
                    ConsultationError::Failed {
                        consultant: entry.id.clone(),
                        message: failure.to_string(),
                    }
                }
                Err(_) => {
                    self.registry
                        .record_failure(&entry.id, format!("timeout after {}ms", timeout_ms));
                    ConsultationError::Timeout {
                        consultant: entry.id.clone(),
                        timeout_ms,
                    }
                }
            };

            debug!(item_id = %item.id, consultant = %entry.id, attempt, remaining, error = %error, "Consultant call failed");
            last_error = Some(error);
        }

        Err(last_error.unwrap_or(ConsultationError::BudgetExhausted {
            limit: self.config.max_consultations_per_item,
        }))
    }

    /// Stamp trace data on an accepted result and update the context.
    async fn finish(
        &self,
        item: &WorkItem,
        mut result: ExecutionResult,
        trace: &mut ExecutionTrace,
    ) -> ExecutionResult {
        trace.state.mark_terminal();
        result.duration_ms = trace.elapsed_ms();
        result.recovery_path = std::mem::take(&mut trace.recovery_path);
        result.tiers_visited = trace.state.visited.clone();
        result.annotations = trace.state.annotations.clone();

        let summary = match (&result.consultant_id, result.fallback) {
            (_, true) => format!("{} completed via fallback pass-through", item.id),
            (Some(id), _) => format!("{} completed at {} by {}", item.id, result.tier, id),
            (None, _) => format!("{} completed as pass-through", item.id),
        };
        result.context_version = self
            .update_context(item, ContextUpdate::from_source(&item.id).decision(summary))
            .await;

        info!(
            item_id = %item.id,
            tier = %result.tier,
            fallback = result.fallback,
            needs_review = result.needs_review,
            cache_hit = result.cache_hit,
            duration_ms = result.duration_ms,
            "Item completed"
        );
        self.events.emit(
            EventKind::ExecutionCompleted,
            json!({
                "item_id": item.id,
                "tier": result.tier,
                "consultant_id": result.consultant_id,
                "fallback": result.fallback,
                "needs_review": result.needs_review,
                "cache_hit": result.cache_hit,
                "duration_ms": result.duration_ms,
            }),
        );
        result
    }

    async fn update_context(&self, item: &WorkItem, update: ContextUpdate) -> u64 {
        match self.context.apply(update).await {
            Ok(version) => version,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Context update not persisted");
                self.context.version()
            }
        }
    }

    fn emit_started(&self, item: &WorkItem, tier: Tier) {
        self.events.emit(
            EventKind::ExecutionStarted,
            json!({ "item_id": item.id, "tier": tier, "critical": item.critical }),
        );
    }

    fn emit_failed(&self, item: &WorkItem, trace: &ExecutionTrace, error: &OrchestrationError) {
        warn!(item_id = %item.id, kind = %error.kind(), error = %error, "Item failed");
        self.events.emit(
            EventKind::ExecutionFailed,
            json!({
                "item_id": item.id,
                "tier": trace.state.current_tier,
                "kind": error.kind(),
                "error": error.to_string(),
            }),
        );
    }

    fn emit_gate(&self, item: &WorkItem, tier: Tier, assessment: &QualityAssessment) {
        debug!(item_id = %item.id, %tier, score = assessment.score, verdict = %assessment.verdict(), "Quality gate");
        self.events.emit(
            EventKind::QualityGate,
            json!({
                "item_id": item.id,
                "tier": tier,
                "score": assessment.score,
                "passed": assessment.passed,
                "verdict": assessment.verdict(),
                "escalation_needed": assessment.escalation.needed,
            }),
        );
    }

    fn emit_transition(
        &self,
        item: &WorkItem,
        trigger: EscalationTrigger,
        outcome: &TransitionOutcome,
    ) {
        let (from, to) = match *outcome {
            TransitionOutcome::Escalated { from, to } => (from, to),
            TransitionOutcome::Saturated { tier } => (tier, tier),
        };
        self.events.emit(
            EventKind::TierTransition,
            json!({
                "item_id": item.id,
                "from": from,
                "to": to,
                "trigger": trigger,
                "saturated": from == to,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consultant::{HandoffRequest, MockConsultant};
    use crate::events::EventHistory;
    use crate::router::ComplexityAssessment;

    struct FixedTier(Tier);

    impl ComplexityClassifier for FixedTier {
        fn classify(
            &self,
            _item: &WorkItem,
        ) -> Result<ComplexityAssessment, crate::router::ClassificationError> {
            Ok(ComplexityAssessment {
                tier: self.0,
                score: 0.5,
                rationale: "fixed".into(),
            })
        }
    }

    fn scoring(score: f64) -> MockConsultant {
        let mut mock = MockConsultant::new();
        mock.expect_consult().returning(move |_, _| {
            Ok(ConsultationOutput::accepted(Recommendation::new(
                json!({"plan": "ok"}),
                score,
            )))
        });
        mock.expect_improve()
            .returning(|rec, applied| rec.revised(applied));
        mock
    }

    fn failing() -> MockConsultant {
        let mut mock = MockConsultant::new();
        mock.expect_consult()
            .returning(|_, _| Err(ConsultantFailure::Rejected("nope".into())));
        mock
    }

    fn orchestrator(registry: ConsultantRegistry, tier: Tier) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(registry),
            Arc::new(FixedTier(tier)),
        )
        .unwrap()
    }

    fn item() -> WorkItem {
        WorkItem::new("x1", "build the thing")
    }

    #[tokio::test]
    async fn test_direct_is_pass_through() {
        let orch = orchestrator(ConsultantRegistry::new(), Tier::Direct);
        let result = orch.run_item(&item()).await;

        assert!(result.is_success());
        assert_eq!(result.tier, Tier::Direct);
        assert!(result.consultant_id.is_none());
        assert!(result.quality_assessment.is_none());
        assert!(!result.fallback);
        assert_eq!(result.context_version, 1);
    }

    #[tokio::test]
    async fn test_accepts_and_caches() {
        let registry = ConsultantRegistry::new()
            .with("generalist", Tier::Tier1, Arc::new(scoring(0.8)))
            .unwrap();
        let orch = orchestrator(registry, Tier::Tier1);

        let result = orch.run_item(&item()).await;
        assert!(result.is_success());
        assert_eq!(result.consultant_id.as_deref(), Some("generalist"));
        assert!(!result.needs_review);
        assert_eq!(orch.cache().len().await, 1);

        let again = orch.run_item(&item()).await;
        assert!(again.cache_hit);
        assert_eq!(again.recommendation, result.recommendation);
    }

    #[tokio::test]
    async fn test_reviewable_score_accepted_for_review() {
        let registry = ConsultantRegistry::new()
            .with("generalist", Tier::Tier1, Arc::new(scoring(0.6)))
            .unwrap();
        let orch = orchestrator(registry, Tier::Tier1);

        let result = orch.run_item(&item()).await;
        assert!(result.is_success());
        assert!(result.needs_review);
        assert_eq!(result.recommendation.unwrap().revision, 1);
        assert!(orch.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_low_score_escalates_once_per_tier() {
        let registry = ConsultantRegistry::new()
            .with("generalist", Tier::Tier1, Arc::new(scoring(0.2)))
            .unwrap()
            .with("architect", Tier::Tier2, Arc::new(scoring(0.9)))
            .unwrap();
        let orch = orchestrator(registry, Tier::Tier1);

        let result = orch.run_item(&item()).await;
        assert_eq!(result.tier, Tier::Tier2);
        assert_eq!(result.tiers_visited, vec![Tier::Tier1, Tier::Tier2]);
        assert!(!result.needs_review);
    }

    #[tokio::test]
    async fn test_ceiling_quality_failure_needs_review() {
        let registry = ConsultantRegistry::new()
            .with("principal", Tier::Tier3, Arc::new(scoring(0.1)))
            .unwrap();
        let orch = orchestrator(registry, Tier::Tier3);

        let result = orch.run_item(&item()).await;
        assert!(result.is_success());
        assert!(result.needs_review);
        assert_eq!(result.tiers_visited, vec![Tier::Tier3]);
        assert_eq!(result.annotations.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_handoff_reason_fails_validation() {
        let mut mock = MockConsultant::new();
        mock.expect_consult().returning(|_, _| {
            Ok(
                ConsultationOutput::accepted(Recommendation::new(json!({}), 0.4)).with_handoff(
                    HandoffRequest {
                        target_tier: Some(Tier::Tier2),
                        reason: String::new(),
                        assessment: "needs design".into(),
                    },
                ),
            )
        });
        let registry = ConsultantRegistry::new()
            .with("generalist", Tier::Tier1, Arc::new(mock))
            .unwrap();
        let orch = orchestrator(registry, Tier::Tier1);

        let decision = orch.plan_route(&item()).unwrap();
        let err = orch.execute(&item(), decision).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation(_)));

        let result = orch.run_item(&item()).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(result.tier, Tier::Tier1);
        assert_eq!(result.tiers_visited, vec![Tier::Tier1]);
        assert_eq!(result.annotations.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_primary_recovers_with_peer() {
        let registry = ConsultantRegistry::new()
            .with("flaky", Tier::Tier1, Arc::new(failing()))
            .unwrap()
            .with("steady", Tier::Tier1, Arc::new(scoring(0.8)))
            .unwrap();
        let history = Arc::new(EventHistory::new());
        let orch = orchestrator(registry, Tier::Tier1)
            .with_events(EventBus::new().with_sink(history.clone()).shared());

        let result = orch.run_item(&item()).await;
        assert_eq!(result.consultant_id.as_deref(), Some("steady"));
        assert!(!result.fallback);
        assert_eq!(result.recovery_path.len(), 2);
        assert_eq!(result.recovery_path[1].outcome, RecoveryOutcome::Succeeded);
        assert_eq!(history.of_kind(EventKind::RecoveryAttempt).len(), 1);
    }

    #[tokio::test]
    async fn test_no_consultants_falls_back() {
        let orch = orchestrator(ConsultantRegistry::new(), Tier::Tier2);
        let result = orch.run_item(&item()).await;

        assert!(result.is_success());
        assert!(result.fallback);
        assert_eq!(result.tier, Tier::Direct);
        assert_eq!(
            result.recovery_path.last().unwrap().outcome,
            RecoveryOutcome::Fallback
        );
    }

    #[tokio::test]
    async fn test_fallback_disabled_is_exhausted() {
        let registry = ConsultantRegistry::new()
            .with("flaky", Tier::Tier1, Arc::new(failing()))
            .unwrap();
        let config = OrchestratorConfig {
            direct_fallback: false,
            ..OrchestratorConfig::default()
        };
        let orch = ExecutionOrchestrator::new(
            config,
            Arc::new(registry),
            Arc::new(FixedTier(Tier::Tier1)),
        )
        .unwrap();

        let result = orch.run_item(&item()).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Exhausted));
    }

    #[tokio::test]
    async fn test_budget_bounds_calls() {
        let mut mock = MockConsultant::new();
        mock.expect_consult()
            .times(3)
            .returning(|_, _| Err(ConsultantFailure::Rejected("nope".into())));
        let registry = ConsultantRegistry::new()
            .with("flaky", Tier::Tier1, Arc::new(mock))
            .unwrap();
        let config = OrchestratorConfig {
            retry_attempts: 5,
            max_consultations_per_item: 3,
            ..OrchestratorConfig::default()
        };
        let orch = ExecutionOrchestrator::new(
            config,
            Arc::new(registry),
            Arc::new(FixedTier(Tier::Tier1)),
        )
        .unwrap();

        let result = orch.run_item(&item()).await;
        assert!(result.fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consultant_times_out() {
        struct Slow;

        #[async_trait::async_trait]
        impl crate::consultant::Consultant for Slow {
            async fn consult(
                &self,
                _item: &WorkItem,
                _context: &ProjectContext,
            ) -> Result<ConsultationOutput, ConsultantFailure> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ConsultationOutput::accepted(Recommendation::new(json!({}), 1.0)))
            }
        }

        let registry = ConsultantRegistry::new()
            .with("slow", Tier::Tier1, Arc::new(Slow))
            .unwrap();
        let config = OrchestratorConfig {
            execution_timeout_ms: 100,
            retry_attempts: 1,
            ..OrchestratorConfig::default()
        };
        let orch = ExecutionOrchestrator::new(
            config,
            Arc::new(registry),
            Arc::new(FixedTier(Tier::Tier1)),
        )
        .unwrap();

        let result = orch.run_item(&item()).await;
        assert!(result.fallback);
        assert!(result.recovery_path[0].detail.contains("timed out"));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = OrchestratorConfig::default();
        config.quality_thresholds = crate::config::QualityThresholds {
            acceptable: 0.4,
            review: 0.6,
        };
        let built = ExecutionOrchestrator::new(
            config,
            Arc::new(ConsultantRegistry::new()),
            Arc::new(FixedTier(Tier::Tier1)),
        );
        assert!(matches!(built, Err(crate::config::ConfigError::Invalid(_))));

        let config = OrchestratorConfig {
            max_parallel: 0,
            ..OrchestratorConfig::default()
        };
        let built = ExecutionOrchestrator::new(
            config,
            Arc::new(ConsultantRegistry::new()),
            Arc::new(FixedTier(Tier::Tier1)),
        );
        assert!(built.is_err());
    }
}
