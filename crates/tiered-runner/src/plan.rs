use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tiered_coordination::WorkItem;

/// Plan file contents: either a bare list of items or `{ items: [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Items(Vec<WorkItem>),
    Wrapped { items: Vec<WorkItem> },
}

/// Load work items from a JSON or YAML plan file, chosen by extension.
pub fn load_plan(path: &Path) -> Result<Vec<WorkItem>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let plan: PlanFile = if is_yaml {
        serde_yaml::from_str(&raw).context("Failed to parse YAML plan")?
    } else {
        serde_json::from_str(&raw).context("Failed to parse JSON plan")?
    };

    Ok(match plan {
        PlanFile::Items(items) | PlanFile::Wrapped { items } => items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_json_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"[{"id": "x1", "description": "first"},
                {"id": "x2", "description": "second", "dependencies": ["x1"], "critical": true}]"#,
        )
        .unwrap();

        let items = load_plan(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].dependencies, vec!["x1".to_string()]);
        assert!(items[1].critical);
    }

    #[test]
    fn test_load_yaml_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(
            &path,
            "items:\n  - id: x1\n    description: first\n    priority: high\n",
        )
        .unwrap();

        let items = load_plan(&path).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, tiered_coordination::Priority::High);
    }

    #[test]
    fn test_bad_plan_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_plan(&path).is_err());
    }
}
