//! Event history: bounded in-memory window of recent events
//!
//! Registered on the bus as a sink, so it sees every event in publish order.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;

use super::sink::TelemetrySink;
use super::types::{EventKind, TelemetryEvent};

/// Default number of events retained
const DEFAULT_CAPACITY: usize = 1024;

/// Recent-event window for inspection and tests
pub struct EventHistory {
    capacity: usize,
    events: Mutex<VecDeque<TelemetryEvent>>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// All retained events, oldest first
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Retained events of one kind
    pub fn of_kind(&self, kind: EventKind) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    /// Retained events about one work item
    pub fn for_item(&self, item_id: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.item_id() == Some(item_id))
            .collect()
    }

    pub fn stats(&self) -> EventStats {
        EventStats::from_events(&self.events())
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for EventHistory {
    fn record(&self, event: &TelemetryEvent) -> anyhow::Result<()> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}

/// Aggregate statistics for events
#[derive(Debug, Default, Serialize)]
pub struct EventStats {
    pub total_events: usize,
    pub events_by_type: HashMap<String, usize>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub transitions: usize,
    pub failures: usize,
}

impl EventStats {
    pub fn from_events(events: &[TelemetryEvent]) -> Self {
        let mut stats = Self::default();
        for event in events {
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            match event.kind {
                EventKind::CacheHit => stats.cache_hits += 1,
                EventKind::CacheMiss => stats.cache_misses += 1,
                EventKind::TierTransition => stats.transitions += 1,
                EventKind::ExecutionFailed => stats.failures += 1,
                _ => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, item: &str) -> TelemetryEvent {
        TelemetryEvent::new(kind, serde_json::json!({ "item_id": item }))
    }

    #[test]
    fn test_window_is_bounded() {
        let history = EventHistory::with_capacity(2);
        history.record(&event(EventKind::CacheMiss, "a")).unwrap();
        history.record(&event(EventKind::CacheHit, "b")).unwrap();
        history.record(&event(EventKind::CacheHit, "c")).unwrap();

        let events = history.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item_id(), Some("b"));
    }

    #[test]
    fn test_stats_and_filters() {
        let history = EventHistory::new();
        history.record(&event(EventKind::CacheMiss, "a")).unwrap();
        history.record(&event(EventKind::TierTransition, "a")).unwrap();
        history.record(&event(EventKind::ExecutionFailed, "b")).unwrap();

        let stats = history.stats();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.transitions, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(history.for_item("a").len(), 2);
        assert_eq!(history.of_kind(EventKind::ExecutionFailed).len(), 1);
    }
}
