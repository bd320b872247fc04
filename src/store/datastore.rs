//! DataStore - shared value space of node outputs
//!
//! One DashMap keyed by node key, lock-free concurrent access.
//! Downstream bindings read from here through `resolve`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{Map, Value};

/// How a node produced its output
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatus {
    Success,
    /// Node failed and its default output was used instead
    Fallback(String),
}

/// Output of one executed node
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Output object (Arc for O(1) cloning into bindings)
    pub output: Arc<Value>,
    pub duration: Duration,
    pub status: NodeStatus,
}

impl NodeResult {
    pub fn success(output: Map<String, Value>, duration: Duration) -> Self {
        Self {
            output: Arc::new(Value::Object(output)),
            duration,
            status: NodeStatus::Success,
        }
    }

    pub fn fallback(output: Map<String, Value>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            output: Arc::new(Value::Object(output)),
            duration,
            status: NodeStatus::Fallback(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, NodeStatus::Success)
    }

    /// Error that triggered the fallback, if any
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            NodeStatus::Fallback(e) => Some(e),
            NodeStatus::Success => None,
        }
    }
}

/// Thread-safe storage for node outputs
#[derive(Clone, Default)]
pub struct DataStore {
    results: Arc<DashMap<Arc<str>, NodeResult>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node_key: Arc<str>, result: NodeResult) {
        self.results.insert(node_key, result);
    }

    pub fn get(&self, node_key: &str) -> Option<NodeResult> {
        self.results.get(node_key).map(|r| r.value().clone())
    }

    pub fn contains(&self, node_key: &str) -> bool {
        self.results.contains_key(node_key)
    }

    pub fn get_output(&self, node_key: &str) -> Option<Arc<Value>> {
        self.results.get(node_key).map(|r| Arc::clone(&r.output))
    }

    /// Value at `path` inside a node's output
    ///
    /// Outer `None`: the node has no output yet.
    /// Inner `None`: the output exists but has nothing at `path`.
    pub fn resolve(&self, node_key: &str, path: &[String]) -> Option<Option<Value>> {
        let output = self.get_output(node_key)?;
        Some(take_value(&output, path).cloned())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Walk `path` into `value`; numeric segments index arrays
pub fn take_value<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
