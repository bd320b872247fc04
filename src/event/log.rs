//! EventLog - append-only audit trail of one execution
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: workflow, node and fine-grained (template/HTTP/cancel) levels
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since execution start (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// All possible event types
///
/// Uses Arc<str> for node keys to enable zero-cost cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // WORKFLOW LEVEL
    // ═══════════════════════════════════════════
    WorkflowStarted {
        execution_id: i64,
        node_count: usize,
        mode: String,
    },
    WorkflowCompleted {
        final_output: Arc<Value>,
        total_duration_ms: u64,
    },
    WorkflowFailed {
        error: String,
        failed_node: Option<Arc<str>>,
    },
    WorkflowCancelled {
        execution_id: i64,
        /// Node that was running or about to run
        at_node: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    /// Node execution begins with its resolved inputs
    NodeStarted {
        node: Arc<str>,
        kind: String,
        inputs: Value,
    },
    NodeCompleted {
        node: Arc<str>,
        output: Arc<Value>,
        duration_ms: u64,
    },
    NodeFailed {
        node: Arc<str>,
        error: String,
        duration_ms: u64,
    },
    /// Node failed and its default output was used
    NodeFallback {
        node: Arc<str>,
        error: String,
        default_output: Value,
    },

    // ═══════════════════════════════════════════
    // FINE-GRAINED (template/HTTP/cancel)
    // ═══════════════════════════════════════════
    TemplateResolved {
        node: Arc<str>,
        template: String,
        result: String,
    },
    HttpAttemptFailed {
        node: Arc<str>,
        attempt: u64,
        error: String,
    },
    CancelObserved {
        node: Arc<str>,
        execution_id: i64,
    },
}

impl EventKind {
    /// Node key if event is node-related
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node, .. }
            | Self::NodeCompleted { node, .. }
            | Self::NodeFailed { node, .. }
            | Self::NodeFallback { node, .. }
            | Self::TemplateResolved { node, .. }
            | Self::HttpAttemptFailed { node, .. }
            | Self::CancelObserved { node, .. } => Some(node),
            Self::WorkflowStarted { .. }
            | Self::WorkflowCompleted { .. }
            | Self::WorkflowFailed { .. }
            | Self::WorkflowCancelled { .. } => None,
        }
    }

    pub fn is_workflow_event(&self) -> bool {
        self.node().is_none()
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at execution start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// All events (cloned - use `with_events` for zero-copy access)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    pub fn filter_node(&self, node: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.node() == Some(node))
                .cloned()
                .collect()
        })
    }

    pub fn workflow_events(&self) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.is_workflow_event())
                .cloned()
                .collect()
        })
    }

    /// Serialize to JSON for export
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_started(node: &str) -> EventKind {
        EventKind::NodeStarted {
            node: node.into(),
            kind: "http_requester".to_string(),
            inputs: json!({}),
        }
    }

    #[test]
    fn eventkind_node_extraction() {
        assert_eq!(node_started("n1").node(), Some("n1"));
        assert_eq!(
            EventKind::WorkflowCancelled {
                execution_id: 1,
                at_node: Some("n1".into()),
            }
            .node(),
            None
        );
    }

    #[test]
    fn eventkind_serializes_with_type_tag() {
        let kind = EventKind::HttpAttemptFailed {
            node: "http".into(),
            attempt: 2,
            error: "connection refused".to_string(),
        };

        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "http_attempt_failed");
        assert_eq!(json["node"], "http");
        assert_eq!(json["attempt"], 2);
    }

    #[test]
    fn eventkind_deserializes_from_tagged_json() {
        let kind: EventKind = serde_json::from_value(json!({
            "type": "cancel_observed",
            "node": "http",
            "execution_id": 9
        }))
        .unwrap();
        assert_eq!(
            kind,
            EventKind::CancelObserved {
                node: "http".into(),
                execution_id: 9
            }
        );
    }

    #[test]
    fn eventlog_emit_returns_monotonic_ids() {
        let log = EventLog::new();
        assert!(log.is_empty());

        let id1 = log.emit(EventKind::WorkflowStarted {
            execution_id: 1,
            node_count: 2,
            mode: "normal".to_string(),
        });
        let id2 = log.emit(node_started("a"));
        let id3 = log.emit(node_started("b"));

        assert_eq!((id1, id2, id3), (0, 1, 2));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn eventlog_filters_by_node_and_level() {
        let log = EventLog::new();
        log.emit(EventKind::WorkflowStarted {
            execution_id: 1,
            node_count: 2,
            mode: "debug".to_string(),
        });
        log.emit(node_started("a"));
        log.emit(node_started("b"));
        log.emit(EventKind::NodeFailed {
            node: "a".into(),
            error: "x".to_string(),
            duration_ms: 1,
        });

        assert_eq!(log.filter_node("a").len(), 2);
        assert_eq!(log.workflow_events().len(), 1);
        assert_eq!(log.to_json().as_array().unwrap().len(), 4);
    }

    #[test]
    fn eventlog_clones_share_storage() {
        let log = EventLog::new();
        let clone = log.clone();
        clone.emit(node_started("a"));
        assert_eq!(log.len(), 1);
    }
}
