//! Telemetry events
//!
//! Every state transition, cache hit/miss and quality-gate outcome is
//! published as a `{type, data, timestamp}` event. Subscribers use the
//! broadcast channel; external analytics plug in as [`TelemetrySink`]s.

pub mod bus;
pub mod history;
pub mod sink;
pub mod types;

pub use bus::{EventBus, EventFilter, FilteredReceiver, SharedEventBus};
pub use history::{EventHistory, EventStats};
pub use sink::{JsonlSink, TelemetrySink};
pub use types::{EventKind, TelemetryEvent};
