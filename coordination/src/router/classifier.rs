//! Complexity classification: maps a work item to its starting tier
//!
//! The core only consumes [`ComplexityAssessment`]s. [`KeywordClassifier`]
//! is the stock implementation: keyword hits per tier, with complex
//! signals dominating and simple signals acting as counterweight.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::escalation::Tier;
use crate::work_item::WorkItem;

/// Classifier failures. Fatal for the item; there is no recovery path.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("work item {0} has an empty description")]
    EmptyDescription(String),

    #[error("invalid keyword pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("classification failed: {0}")]
    Failed(String),
}

/// Output of the classifier, created once per work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub tier: Tier,
    /// Complexity estimate in `[0, 1]`
    pub score: f64,
    pub rationale: String,
}

/// Pluggable classifier capability. Must be pure and synchronous.
pub trait ComplexityClassifier: Send + Sync {
    fn classify(&self, item: &WorkItem) -> Result<ComplexityAssessment, ClassificationError>;
}

/// Keyword lists, one per tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordLists {
    pub direct: Vec<String>,
    pub tier1: Vec<String>,
    pub tier2: Vec<String>,
    pub tier3: Vec<String>,
    /// Requirement count at which an item is at least TIER_2
    pub requirement_pressure: usize,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordLists {
    fn default() -> Self {
        Self {
            direct: words(&[
                "typo",
                "rename",
                "reformat",
                "bump version",
                "update changelog",
                "fix comment",
                "docs only",
            ]),
            tier1: words(&[
                "fix",
                "add test",
                "unit test",
                "small",
                "simple",
                "update",
                "validation",
                "endpoint",
                "config option",
            ]),
            tier2: words(&[
                "refactor",
                "integrate",
                "performance",
                "schema",
                "api",
                "async",
                "cache",
                "protocol",
                "multi-file",
            ]),
            tier3: words(&[
                "architecture",
                "redesign",
                "distributed",
                "migration",
                "security",
                "concurrency",
                "cross-module",
                "state machine",
                "consensus",
                "orchestrat",
            ]),
            requirement_pressure: 5,
        }
    }
}

/// One compiled keyword list
#[derive(Debug, Clone)]
struct KeywordSet {
    pattern: Option<Regex>,
}

impl KeywordSet {
    fn compile(keywords: &[String]) -> Result<Self, ClassificationError> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        // Prefix match so "orchestrat" covers orchestrator/orchestration
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Distinct keywords found in `text`
    fn hits(&self, text: &str) -> Vec<String> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|m| seen.insert(m.clone()))
            .collect()
    }
}

/// Regex keyword classifier
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    direct: KeywordSet,
    tier1: KeywordSet,
    tier2: KeywordSet,
    tier3: KeywordSet,
    requirement_pressure: usize,
}

impl KeywordClassifier {
    pub fn new(lists: &KeywordLists) -> Result<Self, ClassificationError> {
        Ok(Self {
            direct: KeywordSet::compile(&lists.direct)?,
            tier1: KeywordSet::compile(&lists.tier1)?,
            tier2: KeywordSet::compile(&lists.tier2)?,
            tier3: KeywordSet::compile(&lists.tier3)?,
            requirement_pressure: lists.requirement_pressure,
        })
    }

    /// Classifier with the built-in keyword lists
    pub fn standard() -> Result<Self, ClassificationError> {
        Self::new(&KeywordLists::default())
    }
}

impl ComplexityClassifier for KeywordClassifier {
    fn classify(&self, item: &WorkItem) -> Result<ComplexityAssessment, ClassificationError> {
        if item.description.trim().is_empty() {
            return Err(ClassificationError::EmptyDescription(item.id.clone()));
        }

        let mut text = item.description.clone();
        for extra in item.requirements.iter().chain(item.constraints.iter()) {
            text.push('\n');
            text.push_str(extra);
        }

        let direct = self.direct.hits(&text);
        let simple = self.tier1.hits(&text);
        let medium = self.tier2.hits(&text);
        let complex = self.tier3.hits(&text);
        let pressured =
            self.requirement_pressure > 0 && item.requirements.len() >= self.requirement_pressure;

        let (tier, why) = if complex.len() >= 2
            || (!complex.is_empty() && simple.is_empty() && direct.is_empty())
        {
            (Tier::Tier3, format!("complex signals {:?}", complex))
        } else if !complex.is_empty() || medium.len() >= 2 || (!medium.is_empty() && simple.is_empty())
        {
            (
                Tier::Tier2,
                format!("complex {:?} / medium {:?} signals", complex, medium),
            )
        } else if pressured {
            (
                Tier::Tier2,
                format!("{} requirements", item.requirements.len()),
            )
        } else if !simple.is_empty() || !medium.is_empty() {
            (Tier::Tier1, format!("simple signals {:?}", simple))
        } else if !direct.is_empty() && item.requirements.is_empty() {
            (Tier::Direct, format!("trivial signals {:?}", direct))
        } else {
            (Tier::Tier1, "no signals, defaulting to first tier".to_string())
        };

        let raw = 0.1
            + 0.3 * complex.len() as f64
            + 0.15 * medium.len() as f64
            + 0.05 * simple.len() as f64
            + 0.03 * (item.requirements.len() + item.constraints.len()) as f64
            - 0.05 * direct.len() as f64;

        Ok(ComplexityAssessment {
            tier,
            score: raw.clamp(0.0, 1.0),
            rationale: why,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(description: &str) -> ComplexityAssessment {
        KeywordClassifier::standard()
            .unwrap()
            .classify(&WorkItem::new("t", description))
            .unwrap()
    }

    #[test]
    fn test_trivial_goes_direct() {
        assert_eq!(classify("Fix typo in README").tier, Tier::Tier1);
        assert_eq!(classify("Rename the variable").tier, Tier::Direct);
    }

    #[test]
    fn test_simple_goes_tier1() {
        let a = classify("Add test for the login endpoint");
        assert_eq!(a.tier, Tier::Tier1);
        assert!(a.rationale.contains("simple"));
    }

    #[test]
    fn test_medium_goes_tier2() {
        assert_eq!(classify("Refactor the cache layer").tier, Tier::Tier2);
    }

    #[test]
    fn test_complex_dominates() {
        let a = classify("Redesign the architecture of the orchestrator");
        assert_eq!(a.tier, Tier::Tier3);
        assert!(a.score > 0.5);
    }

    #[test]
    fn test_complex_with_counterweight_is_tier2() {
        assert_eq!(classify("Small fix to the migration script").tier, Tier::Tier2);
    }

    #[test]
    fn test_unknown_defaults_to_tier1() {
        assert_eq!(classify("Do the thing").tier, Tier::Tier1);
    }

    #[test]
    fn test_requirement_pressure() {
        let mut item = WorkItem::new("t", "Do the thing");
        for i in 0..5 {
            item = item.with_requirement(format!("req {}", i));
        }
        let a = KeywordClassifier::standard().unwrap().classify(&item).unwrap();
        assert_eq!(a.tier, Tier::Tier2);
    }

    #[test]
    fn test_empty_description_is_error() {
        let err = KeywordClassifier::standard()
            .unwrap()
            .classify(&WorkItem::new("t", "   "))
            .unwrap_err();
        assert!(matches!(err, ClassificationError::EmptyDescription(_)));
    }

    #[test]
    fn test_custom_lists() {
        let lists = KeywordLists {
            tier3: vec!["kernel".to_string()],
            ..KeywordLists::default()
        };
        let classifier = KeywordClassifier::new(&lists).unwrap();
        let a = classifier
            .classify(&WorkItem::new("t", "patch the kernel"))
            .unwrap();
        assert_eq!(a.tier, Tier::Tier3);
    }
}
