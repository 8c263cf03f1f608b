//! Execution planning: dependency depth and group partitioning
//!
//! depth(item) = 0 without dependencies, else 1 + max(depth(dep)).
//! Depths are memoized; a "visiting" set catches cycles before anything
//! runs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::orchestrator::ErrorKind;
use crate::work_item::{WorkItem, WorkItemId};

/// Fatal plan errors, raised before any item executes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<WorkItemId> },

    #[error("work item {item} depends on unknown item {dependency}")]
    UnknownDependency {
        item: WorkItemId,
        dependency: WorkItemId,
    },

    #[error("duplicate work item id: {0}")]
    DuplicateId(WorkItemId),
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::UnknownDependency { .. } | Self::DuplicateId(_) => ErrorKind::Validation,
        }
    }
}

/// Items sharing one dependency depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionGroup {
    pub depth: usize,
    pub items: Vec<WorkItemId>,
}

/// Groups in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub groups: Vec<ExecutionGroup>,
}

impl ExecutionPlan {
    /// Partition `items` into dependency groups.
    ///
    /// Within a group, items are ordered by priority (highest first), then id.
    pub fn build(items: &[WorkItem]) -> Result<Self, PlanError> {
        let mut by_id: HashMap<&str, &WorkItem> = HashMap::with_capacity(items.len());
        for item in items {
            if by_id.insert(item.id.as_str(), item).is_some() {
                return Err(PlanError::DuplicateId(item.id.clone()));
            }
        }
        for item in items {
            if let Some(missing) = item
                .dependencies
                .iter()
                .find(|d| !by_id.contains_key(d.as_str()))
            {
                return Err(PlanError::UnknownDependency {
                    item: item.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut depths: HashMap<&str, usize> = HashMap::with_capacity(items.len());
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        for item in items {
            depth_of(&item.id, &by_id, &mut depths, &mut visiting, &mut stack)?;
        }

        let max_depth = depths.values().copied().max();
        let mut groups: Vec<ExecutionGroup> = match max_depth {
            Some(max) => (0..=max)
                .map(|depth| ExecutionGroup {
                    depth,
                    items: Vec::new(),
                })
                .collect(),
            None => Vec::new(),
        };

        let mut ordered: Vec<&WorkItem> = items.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        for item in ordered {
            let depth = depths.get(item.id.as_str()).copied().unwrap_or(0);
            groups[depth].items.push(item.id.clone());
        }

        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group ids only, in execution order
    pub fn group_ids(&self) -> Vec<Vec<WorkItemId>> {
        self.groups.iter().map(|g| g.items.clone()).collect()
    }
}

fn depth_of<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a WorkItem>,
    depths: &mut HashMap<&'a str, usize>,
    visiting: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
) -> Result<usize, PlanError> {
    if let Some(depth) = depths.get(id) {
        return Ok(*depth);
    }
    if visiting.contains(id) {
        let start = stack.iter().position(|s| *s == id).unwrap_or(0);
        let mut cycle: Vec<WorkItemId> = stack[start..].iter().map(|s| s.to_string()).collect();
        cycle.push(id.to_string());
        return Err(PlanError::CyclicDependency { cycle });
    }

    let Some(&item) = by_id.get(id) else {
        return Ok(0);
    };
    visiting.insert(id);
    stack.push(id);

    let mut depth = 0;
    for dep in &item.dependencies {
        depth = depth.max(depth_of(dep.as_str(), by_id, depths, visiting, stack)? + 1);
    }

    stack.pop();
    visiting.remove(id);
    depths.insert(id, depth);
    Ok(depth)
}
