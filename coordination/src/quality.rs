//! Quality Gate: accept, improve or escalate a recommendation
//!
//! ```text
//! score >= acceptable                      → Accept
//! score <  review, improvement applied     → Escalate
//! otherwise                                → Improve
//! ```
//!
//! The gate is pure: it never touches the recommendation. Applying the
//! improvement suggestions is the orchestrator's job, and it does so at
//! most once per consultation.

use serde::{Deserialize, Serialize};

use crate::config::QualityThresholds;
use crate::consultant::Recommendation;
use crate::work_item::WorkItem;

/// Escalation advice attached to an assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationAdvice {
    pub needed: bool,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Outcome of one gate evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub passed: bool,
    /// Suggestions still open on the evaluated recommendation
    #[serde(default)]
    pub improvements: Vec<String>,
    pub escalation: EscalationAdvice,
}

/// The three gate decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityVerdict {
    Accept,
    Improve,
    Escalate,
}

impl std::fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Improve => write!(f, "improve"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

impl QualityAssessment {
    pub fn verdict(&self) -> QualityVerdict {
        if self.passed {
            QualityVerdict::Accept
        } else if self.escalation.needed {
            QualityVerdict::Escalate
        } else {
            QualityVerdict::Improve
        }
    }
}

/// Threshold-driven quality gate
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> QualityThresholds {
        self.thresholds
    }

    /// Evaluate a recommendation produced for `item`.
    pub fn evaluate(&self, recommendation: &Recommendation, item: &WorkItem) -> QualityAssessment {
        let score = recommendation.score;
        let QualityThresholds { acceptable, review } = self.thresholds;
        let passed = score >= acceptable;

        let mut escalation = EscalationAdvice::default();
        if !passed && score < review && recommendation.is_revised() {
            escalation.needed = true;
            escalation.reasons.push(format!(
                "score {:.2} for {} below review threshold {:.2} after {} improvement pass(es)",
                score, item.id, review, recommendation.revision
            ));
            if recommendation.improvements.is_empty() {
                escalation
                    .reasons
                    .push("consultant has no further improvements".to_string());
            }
        }

        QualityAssessment {
            score,
            passed,
            improvements: if passed {
                Vec::new()
            } else {
                recommendation.improvements.clone()
            },
            escalation,
        }
    }

    /// Whether an assessment sits in the reviewable band `[review, acceptable)`
    pub fn is_reviewable(&self, assessment: &QualityAssessment) -> bool {
        !assessment.passed && assessment.score >= self.thresholds.review
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> QualityGate {
        QualityGate::new(QualityThresholds {
            acceptable: 0.7,
            review: 0.5,
        })
    }

    fn rec(score: f64) -> Recommendation {
        Recommendation::new(serde_json::json!({"plan": "x"}), score)
            .with_improvements(vec!["add error handling".to_string()])
    }

    fn item() -> WorkItem {
        WorkItem::new("x1", "build the parser")
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let assessment = gate().evaluate(&rec(0.7), &item());
        assert!(assessment.passed);
        assert_eq!(assessment.verdict(), QualityVerdict::Accept);
        assert!(assessment.improvements.is_empty());
    }

    #[test]
    fn test_low_score_improves_before_escalating() {
        let first = gate().evaluate(&rec(0.3), &item());
        assert_eq!(first.verdict(), QualityVerdict::Improve);
        assert!(!first.escalation.needed);
        assert_eq!(first.improvements, vec!["add error handling".to_string()]);

        let improved = rec(0.3).revised(&first.improvements);
        let second = gate().evaluate(&improved, &item());
        assert_eq!(second.verdict(), QualityVerdict::Escalate);
        assert_eq!(second.escalation.reasons.len(), 2);
    }

    #[test]
    fn test_reviewable_band_never_escalates() {
        let improved = rec(0.6).revised(&["add error handling".to_string()]);
        let assessment = gate().evaluate(&improved, &item());
        assert_eq!(assessment.verdict(), QualityVerdict::Improve);
        assert!(gate().is_reviewable(&assessment));
    }

    #[test]
    fn test_evaluate_does_not_mutate() {
        let recommendation = rec(0.2);
        let before = recommendation.clone();
        let a = gate().evaluate(&recommendation, &item());
        let b = gate().evaluate(&recommendation, &item());
        assert_eq!(recommendation, before);
        assert_eq!(a, b);
    }
}
