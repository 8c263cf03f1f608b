//! Work items: the unit of work routed through the consultation pipeline
//!
//! A work item is immutable once submitted. Everything downstream (routing
//! decisions, cache records, execution results) refers to it by id.

use serde::{Deserialize, Serialize};

/// Identifier of a work item, unique within one submitted set.
pub type WorkItemId = String;

/// Scheduling priority of a work item.
///
/// Priority never overrides dependency order; it only orders items inside
/// one dependency group when they are launched.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// A discrete unit of work submitted for consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique id within the submitted set
    pub id: WorkItemId,
    /// Free-text description of what is asked
    pub description: String,
    /// Requirements the outcome has to satisfy
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Constraints the outcome must respect
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Ids of work items that must settle before this one starts
    #[serde(default)]
    pub dependencies: Vec<WorkItemId>,
    /// Launch priority inside a dependency group
    #[serde(default)]
    pub priority: Priority,
    /// Whether a failure of this item aborts the rest of the plan
    #[serde(default)]
    pub critical: bool,
}

impl WorkItem {
    /// Create a work item with no requirements, constraints or dependencies.
    pub fn new(id: impl Into<WorkItemId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            requirements: Vec::new(),
            constraints: Vec::new(),
            dependencies: Vec::new(),
            priority: Priority::Normal,
            critical: false,
        }
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn depends_on(mut self, id: impl Into<WorkItemId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Short description suitable for log lines.
    pub fn preview(&self) -> String {
        const MAX: usize = 80;
        if self.description.chars().count() > MAX {
            let cut: String = self.description.chars().take(MAX).collect();
            format!("{}...", cut)
        } else {
            self.description.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let item = WorkItem::new("x2", "Wire the cache")
            .with_requirement("ttl aware")
            .with_constraint("no global state")
            .depends_on("x1")
            .with_priority(Priority::High)
            .critical();

        assert_eq!(item.dependencies, vec!["x1".to_string()]);
        assert_eq!(item.priority, Priority::High);
        assert!(item.critical);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let item: WorkItem =
            serde_json::from_str(r#"{"id":"x1","description":"plan the schema"}"#).unwrap();
        assert!(item.requirements.is_empty());
        assert!(item.dependencies.is_empty());
        assert_eq!(item.priority, Priority::Normal);
        assert!(!item.critical);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let item = WorkItem::new("u", "é".repeat(100));
        let preview = item.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 83);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Normal > Priority::Low);
    }
}
