//! Graph validation before ordering
//!
//! Validates:
//! - node keys are unique
//! - every `ref` binding names an existing node
//! - every ordering edge joins existing nodes

use rustc_hash::FxHashSet;

use crate::error::{FlowError, Result};

use super::workflow::WorkflowSchema;

pub fn validate_references(schema: &WorkflowSchema) -> Result<()> {
    let mut keys: FxHashSet<&str> = FxHashSet::default();
    for node in &schema.nodes {
        if !keys.insert(node.key.as_str()) {
            return Err(FlowError::DuplicateNode {
                key: node.key.clone(),
            });
        }
    }

    for node in &schema.nodes {
        for reference in node.inputs.iter().filter_map(|f| f.as_reference()) {
            if !keys.contains(reference.from_node.as_str()) {
                return Err(FlowError::UnknownNode {
                    node: node.key.clone(),
                    from_node: reference.from_node.clone(),
                });
            }
        }
    }

    for edge in &schema.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !keys.contains(endpoint.as_str()) {
                return Err(FlowError::UnknownNode {
                    node: format!("{} → {}", edge.from, edge.to),
                    from_node: endpoint.clone(),
                });
            }
        }
    }

    Ok(())
}
