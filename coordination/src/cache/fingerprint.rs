//! Fingerprints: stable content hashes of (consultant, item, context)
//!
//! Only the parts that can change a consultant's answer are hashed: the
//! item's description, requirements and constraints, and the project's
//! constraints and objectives. Ids, priorities, dependencies and the
//! ever-growing decision log are left out. Lists are trimmed, lowercased,
//! deduplicated and sorted so equivalent inputs hash the same.

use serde::{Deserialize, Serialize};

use crate::context::ProjectContext;
use crate::work_item::WorkItem;

/// Hex-encoded blake3 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a consultation.
    pub fn compute(consultant_id: &str, item: &WorkItem, context: &ProjectContext) -> Self {
        let canonical = serde_json::json!({
            "consultant": consultant_id,
            "item": {
                "description": normalize(&item.description),
                "requirements": normalize_list(item.requirements.iter()),
                "constraints": normalize_list(item.constraints.iter()),
            },
            "context": {
                "constraints": normalize_list(context.constraints.iter().map(|e| &e.text)),
                "objectives": normalize_list(context.objectives.iter().map(|e| &e.text)),
            },
        });
        // serde_json maps are ordered by key, so the encoding is canonical
        let encoded = canonical.to_string();
        Self(blake3::hash(encoded.as_bytes()).to_hex().to_string())
    }

    /// Wrap an existing digest (e.g. a persisted record key).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_list<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = items
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
