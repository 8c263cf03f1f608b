//! Event bus for orchestration telemetry
//!
//! Provides pub/sub messaging using Tokio broadcast channels and forwards
//! every event to the registered sinks. Emitting never fails the caller.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::sink::TelemetrySink;
use super::types::{EventKind, TelemetryEvent};

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Event bus with broadcast channel and fire-and-forget sinks
pub struct EventBus {
    sender: broadcast::Sender<TelemetryEvent>,
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl EventBus {
    /// Create a new event bus without sinks
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            sinks: Vec::new(),
        }
    }

    /// Attach a sink that receives every event
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to sinks and subscribers
    pub fn publish(&self, event: TelemetryEvent) {
        let event_type = event.event_type();

        for sink in &self.sinks {
            if let Err(e) = sink.record(&event) {
                warn!(event_type, error = %e, "Telemetry sink failed");
            }
        }

        // No receivers is fine
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    /// Build and publish an event
    pub fn emit(&self, kind: EventKind, data: serde_json::Value) {
        self.publish(TelemetryEvent::new(kind, data));
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by work item id
    pub item_id: Option<String>,
    /// Filter by event kinds
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, item_id: &str) -> Self {
        self.item_id = Some(item_id.to_string());
        self
    }

    pub fn kinds(mut self, kinds: Vec<EventKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &TelemetryEvent) -> bool {
        if let Some(ref id) = self.item_id {
            if event.item_id() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<TelemetryEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<TelemetryEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<TelemetryEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

impl EventBus {
    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}
