//! Profile-driven consultants
//!
//! Deterministic stand-ins for real consultants: each profile scores an item
//! from its size and either answers, improves on request, or hands off when
//! its score falls below a configured floor.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tiered_coordination::{
    Consultant, ConsultantFailure, ConsultantRegistry, ConsultationOutput, HandoffRequest,
    ProjectContext, Recommendation, Tier, WorkItem,
};

/// A consultant declared in the runner config
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantProfile {
    pub id: String,
    pub tier: Tier,
    /// Score for an item without requirements or constraints
    pub base_score: f64,
    /// Score lost per requirement or constraint
    #[serde(default = "default_penalty")]
    pub penalty_per_requirement: f64,
    /// Score gained by one improvement pass
    #[serde(default = "default_gain")]
    pub improvement_gain: f64,
    /// Hand off to the next tier when the score is below this
    #[serde(default)]
    pub handoff_below: Option<f64>,
    /// Suggestions attached to every recommendation
    #[serde(default)]
    pub improvements: Vec<String>,
}

fn default_penalty() -> f64 {
    0.05
}

fn default_gain() -> f64 {
    0.1
}

impl ConsultantProfile {
    /// One consultant per consulted tier
    pub fn defaults() -> Vec<Self> {
        let profile = |id: &str, tier, base_score, handoff_below| Self {
            id: id.to_string(),
            tier,
            base_score,
            penalty_per_requirement: default_penalty(),
            improvement_gain: default_gain(),
            handoff_below,
            improvements: vec!["tighten acceptance criteria".to_string()],
        };
        vec![
            profile("generalist", Tier::Tier1, 0.75, Some(0.45)),
            profile("specialist", Tier::Tier2, 0.82, Some(0.4)),
            profile("architect", Tier::Tier3, 0.9, None),
        ]
    }
}

/// Consultant backed by a [`ConsultantProfile`]
pub struct ProfileConsultant {
    profile: ConsultantProfile,
}

impl ProfileConsultant {
    pub fn new(profile: ConsultantProfile) -> Self {
        Self { profile }
    }

    fn score(&self, item: &WorkItem) -> f64 {
        let load = (item.requirements.len() + item.constraints.len()) as f64;
        (self.profile.base_score - load * self.profile.penalty_per_requirement).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Consultant for ProfileConsultant {
    async fn consult(
        &self,
        item: &WorkItem,
        context: &ProjectContext,
    ) -> Result<ConsultationOutput, ConsultantFailure> {
        let score = self.score(item);
        let body = serde_json::json!({
            "consultant": self.profile.id,
            "tier": self.profile.tier,
            "summary": format!("{}: {}", self.profile.id, item.preview()),
            "requirements": item.requirements,
            "respects": context.constraint_texts(),
            "serves": context.objective_texts(),
        });
        let recommendation = Recommendation::new(body, score)
            .with_improvements(self.profile.improvements.iter().cloned());
        let output = ConsultationOutput::accepted(recommendation);

        match self.profile.handoff_below {
            Some(floor) if score < floor && !self.profile.tier.is_ceiling() => {
                Ok(output.with_handoff(HandoffRequest {
                    target_tier: self.profile.tier.next(),
                    reason: format!("score {:.2} below handoff floor {:.2}", score, floor),
                    assessment: format!(
                        "{} requirements and {} constraints exceed {}",
                        item.requirements.len(),
                        item.constraints.len(),
                        self.profile.id
                    ),
                }))
            }
            _ => Ok(output),
        }
    }

    fn improve(&self, recommendation: &Recommendation, improvements: &[String]) -> Recommendation {
        let mut next = recommendation.revised(improvements);
        next.score = (next.score + self.profile.improvement_gain).clamp(0.0, 1.0);
        next
    }
}

/// Register every profile
pub fn build_registry(profiles: &[ConsultantProfile]) -> anyhow::Result<ConsultantRegistry> {
    let mut registry = ConsultantRegistry::new();
    for profile in profiles {
        registry.register(
            profile.id.clone(),
            profile.tier,
            Arc::new(ProfileConsultant::new(profile.clone())),
        )?;
    }
    Ok(registry)
}
