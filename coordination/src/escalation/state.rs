//! Escalation State: Tracks the tier ladder position of one work item

use crate::work_item::WorkItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consultation tiers, ordered by increasing consultation depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Handled without any consultant
    #[serde(rename = "DIRECT")]
    Direct,
    /// First consultation tier
    #[serde(rename = "TIER_1")]
    Tier1,
    /// Second consultation tier
    #[serde(rename = "TIER_2")]
    Tier2,
    /// Deepest tier; nothing above it
    #[serde(rename = "TIER_3")]
    Tier3,
}

impl Tier {
    /// All tiers in ladder order.
    pub const ALL: [Tier; 4] = [Tier::Direct, Tier::Tier1, Tier::Tier2, Tier::Tier3];

    /// The tier directly above this one, if any.
    pub fn next(self) -> Option<Tier> {
        match self {
            Self::Direct => Some(Self::Tier1),
            Self::Tier1 => Some(Self::Tier2),
            Self::Tier2 => Some(Self::Tier3),
            Self::Tier3 => None,
        }
    }

    /// Whether this tier involves a consultant.
    pub fn is_consulted(self) -> bool {
        self != Self::Direct
    }

    /// Whether this is the top of the ladder.
    pub fn is_ceiling(self) -> bool {
        self == Self::Tier3
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Tier1 => "TIER_1",
            Self::Tier2 => "TIER_2",
            Self::Tier3 => "TIER_3",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Ok(Self::Direct),
            "TIER_1" | "TIER1" => Ok(Self::Tier1),
            "TIER_2" | "TIER2" => Ok(Self::Tier2),
            "TIER_3" | "TIER3" => Ok(Self::Tier3),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// What caused a tier transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    /// The consultant declared itself insufficient
    Handoff,
    /// The quality gate required escalation
    QualityGate,
    /// Error recovery moved to an alternative on a higher tier
    Recovery,
}

impl std::fmt::Display for EscalationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handoff => write!(f, "handoff"),
            Self::QualityGate => write!(f, "quality_gate"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

/// Record of an applied transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub trigger: EscalationTrigger,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Escalation state for a single work item.
///
/// The tier only ever moves up. `visited` is the ordered list of tiers the
/// item has been handled at and is therefore non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationState {
    /// Work item this state belongs to
    pub item_id: WorkItemId,
    /// Current tier
    pub current_tier: Tier,
    /// Tiers visited, in order
    pub visited: Vec<Tier>,
    /// Applied transitions
    pub history: Vec<TransitionRecord>,
    /// Rejected transitions and other notes attached to the item
    pub annotations: Vec<String>,
    /// Whether a result was accepted (terminal)
    pub terminal: bool,
    /// Timestamp of last activity
    pub last_activity: DateTime<Utc>,
}

impl EscalationState {
    /// Start tracking an item at its initial tier.
    pub fn new(item_id: impl Into<WorkItemId>, initial_tier: Tier) -> Self {
        Self {
            item_id: item_id.into(),
            current_tier: initial_tier,
            visited: vec![initial_tier],
            history: Vec::new(),
            annotations: Vec::new(),
            terminal: false,
            last_activity: Utc::now(),
        }
    }

    /// Record an applied transition and move to `to_tier`.
    pub(crate) fn record_transition(
        &mut self,
        to_tier: Tier,
        trigger: EscalationTrigger,
        reason: impl Into<String>,
    ) {
        self.history.push(TransitionRecord {
            from_tier: self.current_tier,
            to_tier,
            trigger,
            reason: reason.into(),
            timestamp: Utc::now(),
        });
        self.current_tier = to_tier;
        self.visited.push(to_tier);
        self.last_activity = Utc::now();
    }

    /// Attach a note to the item without changing its tier.
    pub fn annotate(&mut self, note: impl Into<String>) {
        self.annotations.push(note.into());
        self.last_activity = Utc::now();
    }

    /// Mark the item as accepted.
    pub fn mark_terminal(&mut self) {
        self.terminal = true;
        self.last_activity = Utc::now();
    }

    /// Number of upward transitions so far.
    pub fn escalation_count(&self) -> usize {
        self.history.len()
    }

    /// Summary for log lines
    pub fn summary(&self) -> String {
        format!(
            "item={} tier={} escalations={} terminal={}",
            self.item_id,
            self.current_tier,
            self.escalation_count(),
            self.terminal,
        )
    }
}
