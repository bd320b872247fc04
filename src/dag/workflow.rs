//! WorkflowSchema - raw graph definition as authored
//!
//! ```yaml
//! nodes:
//!   - key: entry
//!     type: entry
//!   - key: fetch_user
//!     type: http_requester
//!     configs:
//!       Method: GET
//!       URLConfig: { tpl: "https://api.example.com/users/{{block_output_entry.id}}" }
//!   - key: exit
//!     type: exit
//!     inputs:
//!       - path: [user]
//!         source: { ref: { from_node: fetch_user, from_path: [body] } }
//! edges:
//!   - { from: entry, to: fetch_user }
//! ```
//!
//! Data dependencies are implied by `ref` bindings and template
//! placeholders; `edges` adds ordering-only dependencies.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::NodeSchema;
use crate::error::Result;

/// Ordering-only dependency: `to` runs after `from`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSchema {
    pub nodes: Vec<NodeSchema>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowSchema {
    /// Parse YAML (JSON is accepted as a YAML subset)
    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&source),
            _ => Self::from_yaml(&source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FieldSource, NodeKind};
    use std::io::Write;

    const YAML: &str = r#"
nodes:
  - key: entry
    type: entry
  - key: call
    type: http
    configs:
      Method: GET
      URLConfig: { tpl: "http://host/{{block_output_entry.id}}" }
  - key: exit
    type: exit
    inputs:
      - path: [status]
        source: { ref: { from_node: call, from_path: [statusCode] } }
edges:
  - { from: entry, to: call }
"#;

    #[test]
    fn parses_yaml_definition() {
        let schema = WorkflowSchema::from_yaml(YAML).unwrap();
        assert_eq!(schema.nodes.len(), 3);
        assert_eq!(schema.nodes[1].kind, NodeKind::HttpRequester);
        assert!(matches!(schema.nodes[2].inputs[0].source, FieldSource::Ref(_)));
        assert_eq!(schema.edges[0].to, "call");
    }

    #[test]
    fn loads_json_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"nodes": [{{"key": "entry", "type": "entry"}}]}}"#).unwrap();

        let schema = WorkflowSchema::from_file(file.path()).unwrap();
        assert_eq!(schema.nodes[0].key, "entry");
        assert!(schema.edges.is_empty());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = WorkflowSchema::from_yaml("nodes: [").unwrap_err();
        assert_eq!(err.code(), "FLOW-092");
    }
}
