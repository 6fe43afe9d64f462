//! Event types for observing run progress
//!
//! Events are pushed from the executor to any consumer as a run moves
//! through its layers: run and node lifecycle transitions plus streamed
//! output chunks. Delivery is best-effort; a failing sink never fails the
//! run.

use serde::{Deserialize, Serialize};

/// Trait for receiving run events
///
/// This abstracts over the transport mechanism (mpsc, SSE bridge, log
/// forwarder, ...) so the engine can be observed in different contexts.
pub trait EventSink: Send + Sync {
    /// Deliver an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel
    /// closed). The executor ignores delivery failures.
    fn send(&self, event: RunEvent) -> Result<(), EventError>;
}

/// Error when delivering events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted while a compiled plan runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    /// A run started
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: String },

    /// A run completed successfully
    #[serde(rename_all = "camelCase")]
    RunCompleted { run_id: String },

    /// A run failed, was cancelled, or exceeded its deadline
    #[serde(rename_all = "camelCase")]
    RunFailed { run_id: String, error: String },

    /// A node started executing
    #[serde(rename_all = "camelCase")]
    NodeStarted { run_id: String, node_id: String },

    /// A node completed successfully
    ///
    /// `output` is absent when the node's chunks were forwarded downstream
    /// instead of being materialized.
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        run_id: String,
        node_id: String,
        output: Option<serde_json::Value>,
    },

    /// A node failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        run_id: String,
        node_id: String,
        error: String,
    },

    /// One chunk of run output
    #[serde(rename_all = "camelCase")]
    OutputChunk {
        run_id: String,
        value: serde_json::Value,
    },
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: RunEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<RunEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(RunEvent::NodeStarted {
            run_id: "run1".to_string(),
            node_id: "adder".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            RunEvent::NodeStarted { run_id, node_id } => {
                assert_eq!(run_id, "run1");
                assert_eq!(node_id, "adder");
            }
            _ => panic!("Expected NodeStarted event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(RunEvent::RunStarted {
            run_id: "run1".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = RunEvent::RunFailed {
            run_id: "run1".to_string(),
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "runFailed");
        assert_eq!(json["runId"], "run1");
        assert_eq!(json["error"], "boom");
    }
}
