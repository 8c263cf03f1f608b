//! Consultation Cache: content-addressed memo of consultant outcomes
//!
//! A live record is authoritative: callers that hit never consult again.

pub mod fingerprint;
pub mod store;

pub use fingerprint::Fingerprint;
pub use store::{
    CacheStats, ConsultationCache, ConsultationRecord, SharedConsultationCache,
    HIGH_QUALITY_SCORE, PRESSURE_EVICTION_FRACTION,
};
