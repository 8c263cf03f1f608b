//! Escalation: the tier ladder every work item climbs
//!
//! # Escalation Ladder
//!
//! ```text
//! DIRECT   no consultant, pass-through
//!     │
//! TIER_1   first consultant
//!     │  ├─ consultant requests handoff      → TIER_2
//!     │  └─ quality gate requires escalation → TIER_2
//!     ▼
//! TIER_2
//!     │  (same triggers)
//!     ▼
//! TIER_3   ceiling; a further quality failure is accepted
//!            and flagged for review instead of looping
//! ```
//!
//! Transitions never go down and each one carries a validated handoff
//! document, so an item escalates at most three times.

pub mod engine;
pub mod handoff;
pub mod state;

pub use engine::{EscalationEngine, EscalationError, TransitionOutcome};
pub use handoff::{HandoffDocument, ValidationError};
pub use state::{EscalationState, EscalationTrigger, Tier, TransitionRecord};
