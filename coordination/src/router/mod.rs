//! Router: picks the consultant and tier for a work item
//!
//! # Routing Strategy
//!
//! ```text
//! assessment.tier | primary                           | alternatives
//! ----------------|-----------------------------------|----------------------------------
//! DIRECT          | none (pass-through)               | none
//! TIER_n          | first usable consultant at TIER_n | other TIER_n consultants,
//!                 |                                   | then TIER_n+1, then unusable ones
//! ```
//!
//! Alternatives never point below the decision's tier, so recovery cannot
//! move an item down the ladder.

pub mod classifier;

pub use classifier::{
    ClassificationError, ComplexityAssessment, ComplexityClassifier, KeywordClassifier,
    KeywordLists,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consultant::ConsultantId;
use crate::context::ProjectContext;
use crate::escalation::Tier;
use crate::registry::ConsultantRegistry;
use crate::work_item::{WorkItem, WorkItemId};

/// Most alternatives a decision carries
pub const MAX_ALTERNATIVES: usize = 3;

/// A fallback route for error recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAlternative {
    pub tier: Tier,
    pub consultant_id: Option<ConsultantId>,
    pub reason: String,
}

/// One routing attempt for a work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub work_item_id: WorkItemId,
    pub tier: Tier,
    /// `None` for DIRECT, or when no consultant serves the tier
    pub consultant_id: Option<ConsultantId>,
    pub confidence: f64,
    pub alternatives: Vec<RouteAlternative>,
    /// Context version the decision was made against
    pub context_version: u64,
}

/// Consultant selection over the registry
#[derive(Clone)]
pub struct Router {
    registry: Arc<ConsultantRegistry>,
}

impl Router {
    pub fn new(registry: Arc<ConsultantRegistry>) -> Self {
        Self { registry }
    }

    /// Route an item at the tier its assessment asks for.
    pub fn route(
        &self,
        item: &WorkItem,
        assessment: &ComplexityAssessment,
        context: &ProjectContext,
    ) -> RoutingDecision {
        self.route_at(&item.id, assessment.tier, context)
    }

    /// Route at an explicit tier (initial routing and re-routing after escalation).
    pub fn route_at(&self, item_id: &str, tier: Tier, context: &ProjectContext) -> RoutingDecision {
        if !tier.is_consulted() {
            return RoutingDecision {
                work_item_id: item_id.to_string(),
                tier,
                consultant_id: None,
                confidence: 1.0,
                alternatives: Vec::new(),
                context_version: context.version,
            };
        }

        let at_tier = self.registry.for_tier(tier);
        let primary = at_tier
            .iter()
            .find(|e| self.registry.is_usable(&e.id))
            .map(|e| e.id.clone());
        let confidence = primary
            .as_deref()
            .and_then(|id| self.registry.health(id))
            .map(|h| h.success_rate())
            .unwrap_or(0.0);

        let alternatives = self.alternatives(tier, primary.as_deref());
        debug!(
            item_id,
            %tier,
            consultant = primary.as_deref().unwrap_or("-"),
            alternatives = alternatives.len(),
            "Routed"
        );

        RoutingDecision {
            work_item_id: item_id.to_string(),
            tier,
            consultant_id: primary,
            confidence,
            alternatives,
            context_version: context.version,
        }
    }

    /// Recovery routes for `tier`, excluding the primary.
    pub fn alternatives(&self, tier: Tier, primary: Option<&str>) -> Vec<RouteAlternative> {
        let mut usable = Vec::new();
        let mut unusable = Vec::new();

        for entry in self.registry.for_tier(tier) {
            if Some(entry.id.as_str()) == primary {
                continue;
            }
            let alt = RouteAlternative {
                tier,
                consultant_id: Some(entry.id.clone()),
                reason: format!("peer consultant at {}", tier),
            };
            if self.registry.is_usable(&entry.id) {
                usable.push(alt);
            } else {
                unusable.push(RouteAlternative {
                    reason: format!("unhealthy peer consultant at {}", tier),
                    ..alt
                });
            }
        }

        if let Some(next) = tier.next() {
            for entry in self.registry.for_tier(next) {
                let alt = RouteAlternative {
                    tier: next,
                    consultant_id: Some(entry.id.clone()),
                    reason: format!("escalate to {}", next),
                };
                if self.registry.is_usable(&entry.id) {
                    usable.push(alt);
                } else {
                    unusable.push(alt);
                }
            }
        }

        usable.extend(unusable);
        usable.truncate(MAX_ALTERNATIVES);
        usable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consultant::{Consultant, MockConsultant};

    fn mock() -> Arc<dyn Consultant> {
        Arc::new(MockConsultant::new())
    }

    fn registry() -> Arc<ConsultantRegistry> {
        Arc::new(
            ConsultantRegistry::new()
                .with("generalist", Tier::Tier1, mock())
                .unwrap()
                .with("junior", Tier::Tier1, mock())
                .unwrap()
                .with("architect", Tier::Tier2, mock())
                .unwrap()
                .with("principal", Tier::Tier3, mock())
                .unwrap(),
        )
    }

    fn assessment(tier: Tier) -> ComplexityAssessment {
        ComplexityAssessment {
            tier,
            score: 0.5,
            rationale: "test".into(),
        }
    }

    #[test]
    fn test_direct_never_selects_consultant() {
        let router = Router::new(registry());
        let decision = router.route(
            &WorkItem::new("x1", "rename"),
            &assessment(Tier::Direct),
            &ProjectContext::new(),
        );
        assert_eq!(decision.tier, Tier::Direct);
        assert!(decision.consultant_id.is_none());
        assert!(decision.alternatives.is_empty());
    }

    #[test]
    fn test_primary_and_alternatives() {
        let router = Router::new(registry());
        let decision = router.route(
            &WorkItem::new("x1", "fix"),
            &assessment(Tier::Tier1),
            &ProjectContext::new(),
        );

        assert_eq!(decision.consultant_id.as_deref(), Some("generalist"));
        assert_eq!(decision.confidence, 1.0);
        let alts: Vec<_> = decision
            .alternatives
            .iter()
            .map(|a| (a.tier, a.consultant_id.clone().unwrap()))
            .collect();
        assert_eq!(
            alts,
            vec![
                (Tier::Tier1, "junior".to_string()),
                (Tier::Tier2, "architect".to_string()),
            ]
        );
    }

    #[test]
    fn test_unhealthy_primary_is_skipped() {
        let registry = registry();
        registry.mark_unavailable("generalist", "down");
        let router = Router::new(registry);

        let decision = router.route_at("x1", Tier::Tier1, &ProjectContext::new());
        assert_eq!(decision.consultant_id.as_deref(), Some("junior"));
        assert_eq!(
            decision.alternatives.last().unwrap().consultant_id.as_deref(),
            Some("generalist")
        );
    }

    #[test]
    fn test_alternatives_never_go_down() {
        let router = Router::new(registry());
        let decision = router.route_at("x1", Tier::Tier3, &ProjectContext::new());
        assert_eq!(decision.consultant_id.as_deref(), Some("principal"));
        assert!(decision.alternatives.iter().all(|a| a.tier >= Tier::Tier3));
    }

    #[test]
    fn test_empty_tier_has_no_primary() {
        let router = Router::new(Arc::new(ConsultantRegistry::new()));
        let decision = router.route_at("x1", Tier::Tier2, &ProjectContext::new());
        assert!(decision.consultant_id.is_none());
        assert_eq!(decision.confidence, 0.0);
    }
}
