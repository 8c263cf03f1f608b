//! Orchestrator configuration
//!
//! A single object handed to the orchestrator at construction. Values come
//! from defaults, then an optional TOML file, then `TIERED_*` environment
//! variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration errors; all of them are fatal misconfiguration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Score thresholds of the quality gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Scores at or above this pass
    pub acceptable: f64,
    /// Scores below this (after one improvement pass) escalate
    pub review: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            acceptable: 0.7,
            review: 0.5,
        }
    }
}

/// Cache TTL self-adjustment policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TtlAdjustment {
    pub enabled: bool,
    /// Lookups observed before the first adjustment
    pub min_samples: u64,
    /// Hit rate at or above which the TTL grows
    pub high_hit_rate: f64,
    /// Hit rate at or below which the TTL shrinks
    pub low_hit_rate: f64,
    /// Relative step applied per adjustment
    pub step: f64,
}

impl Default for TtlAdjustment {
    fn default() -> Self {
        Self {
            enabled: true,
            min_samples: 50,
            high_hit_rate: 0.8,
            low_hit_rate: 0.2,
            step: 0.25,
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Base freshness window of cached consultations
    #[serde(rename = "cacheTTLMs")]
    pub cache_ttl_ms: u64,
    /// Entry count above which the cache evicts
    pub max_cache_size: usize,
    pub quality_thresholds: QualityThresholds,
    /// Items running concurrently within one dependency group
    pub max_parallel: usize,
    /// Attempts per consultant call
    pub retry_attempts: u32,
    /// Timeout of a single consultant call
    pub execution_timeout_ms: u64,
    /// Consultant invocations allowed per item, across all tiers
    pub max_consultations_per_item: u32,
    /// Whether an exhausted recovery chain may fall back to a pass-through
    pub direct_fallback: bool,
    pub ttl_adjustment: TtlAdjustment,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 3_600_000,
            max_cache_size: 1000,
            quality_thresholds: QualityThresholds::default(),
            max_parallel: 4,
            retry_attempts: 2,
            execution_timeout_ms: 30_000,
            max_consultations_per_item: 8,
            direct_fallback: true,
            ttl_adjustment: TtlAdjustment::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from an optional file, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TIERED_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        fn parse<T: std::str::FromStr>(var: &str, value: String) -> ConfigResult<T> {
            value.trim().parse().map_err(|_| ConfigError::Env {
                var: var.to_string(),
                value,
            })
        }

        macro_rules! override_field {
            ($var:literal, $field:expr) => {
                if let Some(value) = lookup($var) {
                    $field = parse($var, value)?;
                }
            };
        }

        override_field!("TIERED_CACHE_TTL_MS", self.cache_ttl_ms);
        override_field!("TIERED_MAX_CACHE_SIZE", self.max_cache_size);
        override_field!("TIERED_ACCEPTABLE_THRESHOLD", self.quality_thresholds.acceptable);
        override_field!("TIERED_REVIEW_THRESHOLD", self.quality_thresholds.review);
        override_field!("TIERED_MAX_PARALLEL", self.max_parallel);
        override_field!("TIERED_RETRY_ATTEMPTS", self.retry_attempts);
        override_field!("TIERED_EXECUTION_TIMEOUT_MS", self.execution_timeout_ms);
        override_field!("TIERED_MAX_CONSULTATIONS", self.max_consultations_per_item);
        override_field!("TIERED_DIRECT_FALLBACK", self.direct_fallback);
        Ok(())
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> ConfigResult<()> {
        let QualityThresholds { acceptable, review } = self.quality_thresholds;
        for (name, value) in [("acceptable", acceptable), ("review", review)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "qualityThresholds.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if review > acceptable {
            return Err(ConfigError::Invalid(format!(
                "review threshold {} exceeds acceptable threshold {}",
                review, acceptable
            )));
        }
        if self.max_parallel == 0 {
            return Err(ConfigError::Invalid("maxParallel must be at least 1".into()));
        }
        if self.max_cache_size == 0 {
            return Err(ConfigError::Invalid("maxCacheSize must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retryAttempts must be at least 1".into()));
        }
        if self.max_consultations_per_item == 0 {
            return Err(ConfigError::Invalid(
                "maxConsultationsPerItem must be at least 1".into(),
            ));
        }
        if self.execution_timeout_ms == 0 || self.cache_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts and TTLs must be non-zero".into(),
            ));
        }
        let adj = &self.ttl_adjustment;
        if !(0.0..1.0).contains(&adj.step) || adj.low_hit_rate >= adj.high_hit_rate {
            return Err(ConfigError::Invalid(
                "ttlAdjustment needs 0 <= step < 1 and lowHitRate < highHitRate".into(),
            ));
        }
        Ok(())
    }
}
