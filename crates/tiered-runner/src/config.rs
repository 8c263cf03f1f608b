use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tiered_coordination::{KeywordLists, OrchestratorConfig};

use crate::profile::ConsultantProfile;

/// Runner configuration file: orchestrator options at the top level plus
/// classifier keywords and consultant profiles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerConfig {
    #[serde(flatten)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub classifier: KeywordLists,
    #[serde(default)]
    pub consultants: Vec<ConsultantProfile>,
}

impl RunnerConfig {
    /// Load from an optional TOML file, then apply `TIERED_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str::<RunnerConfig>(&raw)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };

        config.orchestrator.apply_env_overrides()?;
        config.orchestrator.validate()?;
        if config.consultants.is_empty() {
            config.consultants = ConsultantProfile::defaults();
        }
        Ok(config)
    }
}
