//! Consultant Registry: tier assignment and health metadata
//!
//! Consultants are registered once at startup under an id and the tier they
//! serve. Adding a consultant is a registration call; routing never branches
//! on consultant names. Live health (availability, latency, error rates) is
//! updated by the orchestrator after every call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::consultant::{Consultant, ConsultantId};
use crate::escalation::Tier;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("consultant already registered: {0}")]
    Duplicate(ConsultantId),

    #[error("consultants cannot be registered for {0}")]
    DirectTier(Tier),
}

/// Live health metadata for a consultant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultantHealth {
    /// Whether the consultant is currently reachable
    pub available: bool,
    /// Average response latency in milliseconds (successful calls)
    pub avg_latency_ms: u64,
    /// Number of successful calls
    pub success_count: u64,
    /// Number of failed calls
    pub error_count: u64,
    /// Last time health changed (Unix seconds)
    pub last_checked_secs: u64,
    /// Optional human-readable status message
    pub status_message: Option<String>,
}

impl ConsultantHealth {
    pub fn healthy() -> Self {
        Self {
            available: true,
            avg_latency_ms: 0,
            success_count: 0,
            error_count: 0,
            last_checked_secs: unix_now(),
            status_message: None,
        }
    }

    /// Compute success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    pub fn record_success(&mut self, latency_ms: u64) {
        self.avg_latency_ms =
            (self.avg_latency_ms * self.success_count + latency_ms) / (self.success_count + 1);
        self.success_count += 1;
        self.available = true;
        self.status_message = None;
        self.last_checked_secs = unix_now();
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        self.status_message = Some(message.into());
        self.last_checked_secs = unix_now();
    }

    /// Whether the consultant should be picked as a primary route
    pub fn is_usable(&self) -> bool {
        self.available && self.success_rate() >= 0.5
    }
}

/// A registered consultant
#[derive(Clone)]
pub struct ConsultantEntry {
    pub id: ConsultantId,
    pub tier: Tier,
    pub consultant: Arc<dyn Consultant>,
}

impl std::fmt::Debug for ConsultantEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsultantEntry")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Registry of all consultants, resolved at startup
#[derive(Default)]
pub struct ConsultantRegistry {
    entries: HashMap<ConsultantId, ConsultantEntry>,
    /// Registration order, used as routing preference
    order: Vec<ConsultantId>,
    health: RwLock<HashMap<ConsultantId, ConsultantHealth>>,
}

impl ConsultantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consultant serving `tier`.
    pub fn register(
        &mut self,
        id: impl Into<ConsultantId>,
        tier: Tier,
        consultant: Arc<dyn Consultant>,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        if tier == Tier::Direct {
            return Err(RegistryError::DirectTier(tier));
        }
        if self.entries.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.health
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), ConsultantHealth::healthy());
        self.order.push(id.clone());
        self.entries.insert(
            id.clone(),
            ConsultantEntry {
                id,
                tier,
                consultant,
            },
        );
        Ok(())
    }

    /// Builder-style registration
    pub fn with(
        mut self,
        id: impl Into<ConsultantId>,
        tier: Tier,
        consultant: Arc<dyn Consultant>,
    ) -> Result<Self, RegistryError> {
        self.register(id, tier, consultant)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&ConsultantEntry> {
        self.entries.get(id)
    }

    /// Consultants serving `tier`, in registration order.
    pub fn for_tier(&self, tier: Tier) -> Vec<&ConsultantEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.tier == tier)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of a consultant's health
    pub fn health(&self, id: &str) -> Option<ConsultantHealth> {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn is_usable(&self, id: &str) -> bool {
        self.health(id).map(|h| h.is_usable()).unwrap_or(false)
    }

    pub fn record_success(&self, id: &str, latency_ms: u64) {
        if let Some(h) = self
            .health
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(id)
        {
            h.record_success(latency_ms);
        }
    }

    pub fn record_failure(&self, id: &str, message: impl Into<String>) {
        if let Some(h) = self
            .health
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(id)
        {
            h.record_failure(message);
        }
    }

    /// Take a consultant out of primary routing until it succeeds again.
    pub fn mark_unavailable(&self, id: &str, reason: impl Into<String>) {
        if let Some(h) = self
            .health
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(id)
        {
            h.available = false;
            h.status_message = Some(reason.into());
            h.last_checked_secs = unix_now();
        }
    }
}
