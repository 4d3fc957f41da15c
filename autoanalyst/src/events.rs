//! Event sinks for run observability.
//!
//! The executor emits `stage.started` / `stage.completed` / `stage.skipped` /
//! `stage.failed` events through an injected sink; there is no ambient global
//! sink to configure.

use async_trait::async_trait;
use tracing::{debug, info, Level};

/// Trait for sinks that receive pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "stage.started")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {
        // Intentionally empty - discards all events
    }
}

/// A sink that logs events through the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event_type,
                event_data = ?data,
                "Event: {}", event_type
            );
        } else {
            info!(
                event_type = %event_type,
                event_data = ?data,
                "Event: {}", event_type
            );
        }
    }
}

/// A sink that records events in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: std::sync::Mutex<Vec<(String, Option<serde_json::Value>)>>,
}

impl RecordingEventSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event types recorded so far, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event_type.to_string(), data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_discards() {
        let sink = NoOpEventSink;
        sink.emit("stage.started", None).await;
    }

    #[tokio::test]
    async fn recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        sink.emit("stage.started", Some(serde_json::json!({"stage": "a"})))
            .await;
        sink.emit("stage.completed", None).await;

        assert_eq!(
            sink.event_types(),
            vec!["stage.started".to_string(), "stage.completed".to_string()]
        );
        assert_eq!(sink.events().len(), 2);
    }

    #[tokio::test]
    async fn logging_sink_levels() {
        LoggingEventSink::info().emit("stage.started", None).await;
        LoggingEventSink::debug().emit("stage.started", None).await;
    }
}
