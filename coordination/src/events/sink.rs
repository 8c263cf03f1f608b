//! Telemetry sinks: the external analytics boundary
//!
//! Sinks are fire-and-forget: a failing sink is logged and never
//! propagates into the orchestration path.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::TelemetryEvent;

/// Receiver of telemetry events
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &TelemetryEvent) -> anyhow::Result<()>;
}

/// Appends every event as one JSON line to a file
pub struct JsonlSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &TelemetryEvent) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventKind;

    #[test]
    fn test_jsonl_appends_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let sink = JsonlSink::new(&path);

        sink.record(&TelemetryEvent::new(EventKind::CacheMiss, serde_json::json!({})))
            .unwrap();
        sink.record(&TelemetryEvent::new(EventKind::CacheHit, serde_json::json!({})))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: TelemetryEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, EventKind::CacheHit);
    }
}
