//! Project context: decisions, constraints and objectives shared by all items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the project context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub text: String,
    /// Work item or actor that contributed the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Context version that introduced the entry
    pub version: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Versioned, append-only project context.
///
/// Every merge produces a new value with a higher version; an existing
/// value is never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub decisions: Vec<ContextEntry>,
    pub constraints: Vec<ContextEntry>,
    pub objectives: Vec<ContextEntry>,
    /// Monotonically increasing version
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            decisions: Vec::new(),
            constraints: Vec::new(),
            objectives: Vec::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn constraint_texts(&self) -> Vec<String> {
        self.constraints.iter().map(|e| e.text.clone()).collect()
    }

    pub fn objective_texts(&self) -> Vec<String> {
        self.objectives.iter().map(|e| e.text.clone()).collect()
    }

    /// Merge an update into a new context value.
    ///
    /// Decisions are always appended; constraints and objectives are added
    /// only when not already present (case-insensitive). Returns `None`
    /// when the update changes nothing.
    pub fn merged(&self, update: &ContextUpdate) -> Option<ProjectContext> {
        let version = self.version + 1;
        let now = Utc::now();
        let entry = |text: &str| ContextEntry {
            text: text.trim().to_string(),
            source: update.source.clone(),
            version,
            recorded_at: now,
        };

        let mut next = self.clone();
        let mut changed = false;

        for text in update.decisions.iter().filter(|t| !t.trim().is_empty()) {
            next.decisions.push(entry(text));
            changed = true;
        }
        for text in &update.constraints {
            if push_unique(&mut next.constraints, text, &entry) {
                changed = true;
            }
        }
        for text in &update.objectives {
            if push_unique(&mut next.objectives, text, &entry) {
                changed = true;
            }
        }

        if !changed {
            return None;
        }
        next.version = version;
        next.updated_at = now;
        Some(next)
    }
}

fn push_unique(
    entries: &mut Vec<ContextEntry>,
    text: &str,
    entry: &impl Fn(&str) -> ContextEntry,
) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    if entries.iter().any(|e| e.text.to_lowercase() == lowered) {
        return false;
    }
    entries.push(entry(trimmed));
    true
}

/// An append/merge request against the project context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUpdate {
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ContextUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn decision(mut self, text: impl Into<String>) -> Self {
        self.decisions.push(text.into());
        self
    }

    pub fn constraint(mut self, text: impl Into<String>) -> Self {
        self.constraints.push(text.into());
        self
    }

    pub fn objective(mut self, text: impl Into<String>) -> Self {
        self.objectives.push(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.constraints.is_empty() && self.objectives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_bumps_version_and_keeps_original() {
        let ctx = ProjectContext::new();
        let next = ctx
            .merged(
                &ContextUpdate::from_source("x1")
                    .decision("use postgres")
                    .constraint("no unsafe"),
            )
            .unwrap();

        assert_eq!(ctx.version, 0);
        assert!(ctx.decisions.is_empty());
        assert_eq!(next.version, 1);
        assert_eq!(next.decisions[0].source.as_deref(), Some("x1"));
        assert_eq!(next.constraints[0].version, 1);
    }

    #[test]
    fn test_constraints_deduplicate_case_insensitively() {
        let ctx = ProjectContext::new()
            .merged(&ContextUpdate::new().constraint("No unsafe"))
            .unwrap();
        assert!(ctx
            .merged(&ContextUpdate::new().constraint("  no UNSAFE "))
            .is_none());
    }

    #[test]
    fn test_decisions_always_append() {
        let ctx = ProjectContext::new()
            .merged(&ContextUpdate::new().decision("retry once"))
            .unwrap();
        let next = ctx
            .merged(&ContextUpdate::new().decision("retry once"))
            .unwrap();
        assert_eq!(next.decisions.len(), 2);
        assert_eq!(next.version, 2);
    }

    #[test]
    fn test_blank_update_is_noop() {
        let ctx = ProjectContext::new();
        assert!(ctx
            .merged(&ContextUpdate::new().decision("  ").objective(""))
            .is_none());
        assert!(ContextUpdate::new().is_empty());
    }
}
