//! Graph compiler - `WorkflowSchema` to `CompiledWorkflow`
//!
//! Per node, once:
//! 1. decode the typed `NodeConfig` (missing keys fail here, not at run time)
//! 2. turn HTTP template placeholders into input bindings, then deduplicate
//!
//! Then for the graph: validate references, reject cycles, fix the order.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use crate::ast::{FieldInfo, NodeKind, NodeSchema};
use crate::binding::{deduplicate_input_fields, extract_input_fields_from_template};
use crate::error::{FlowError, Result};
use crate::nodes::database::DatabaseConfig;
use crate::nodes::http::HttpConfig;

use super::flow::FlowGraph;
use super::validate::validate_references;
use super::workflow::WorkflowSchema;

/// Typed configuration, one variant per node kind family
#[derive(Debug, Clone)]
pub enum NodeConfig {
    Entry,
    Exit,
    Http(HttpConfig),
    Database(DatabaseConfig),
    SubWorkflow { workflow_id: i64, version: String },
}

impl NodeConfig {
    pub fn from_schema(schema: &NodeSchema) -> Result<Self> {
        match schema.kind {
            NodeKind::Entry => Ok(NodeConfig::Entry),
            NodeKind::Exit => Ok(NodeConfig::Exit),
            NodeKind::HttpRequester => HttpConfig::from_schema(schema).map(NodeConfig::Http),
            NodeKind::DatabaseQuery
            | NodeKind::DatabaseInsert
            | NodeKind::DatabaseUpdate
            | NodeKind::DatabaseDelete => DatabaseConfig::from_schema(schema).map(NodeConfig::Database),
            NodeKind::SubWorkflow => {
                let (workflow_id, version) =
                    schema
                        .sub_workflow_identity()?
                        .ok_or_else(|| FlowError::MissingConfig {
                            node: schema.key.clone(),
                            key: crate::ast::CONFIG_WORKFLOW_ID.to_string(),
                        })?;
                Ok(NodeConfig::SubWorkflow {
                    workflow_id,
                    version,
                })
            }
        }
    }
}

/// Node ready to run: bindings final, configuration decoded
#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub key: Arc<str>,
    pub schema: NodeSchema,
    pub config: NodeConfig,
}

#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    nodes: FxHashMap<Arc<str>, CompiledNode>,
    order: Vec<Arc<str>>,
    entry: Option<Arc<str>>,
    exit: Option<Arc<str>>,
}

impl CompiledWorkflow {
    /// Execution order
    pub fn order(&self) -> &[Arc<str>] {
        &self.order
    }

    pub fn node(&self, key: &str) -> Option<&CompiledNode> {
        self.nodes.get(key)
    }

    /// Nodes in execution order
    pub fn iter(&self) -> impl Iterator<Item = &CompiledNode> {
        self.order.iter().filter_map(|key| self.nodes.get(key))
    }

    pub fn entry(&self) -> Option<&Arc<str>> {
        self.entry.as_ref()
    }

    /// The exit node, or the last node in order when there is none
    pub fn exit(&self) -> Option<&Arc<str>> {
        self.exit.as_ref().or_else(|| self.order.last())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Input bindings implied by an HTTP node's templates, each placed under
/// the request field its template renders against
fn template_bindings(config: &HttpConfig) -> Result<Vec<FieldInfo>> {
    let mut bindings = Vec::new();
    for (field, template) in config.templates() {
        for binding in extract_input_fields_from_template(template)? {
            bindings.push(FieldInfo {
                path: binding.path.prefixed(field),
                source: binding.source,
            });
        }
    }
    Ok(bindings)
}

fn single_of_kind(schema: &WorkflowSchema, kind: NodeKind) -> Result<Option<Arc<str>>> {
    let mut found = schema.nodes.iter().filter(|n| n.kind == kind);
    let first = found.next();
    if let Some(second) = found.next() {
        return Err(FlowError::InvalidConfig {
            node: second.key.clone(),
            key: "type".to_string(),
            reason: format!("a workflow has at most one {kind} node"),
        });
    }
    Ok(first.map(|n| Arc::from(n.key.as_str())))
}

#[instrument(skip(schema), fields(nodes = schema.nodes.len()))]
pub fn compile(mut schema: WorkflowSchema) -> Result<CompiledWorkflow> {
    let mut configs = Vec::with_capacity(schema.nodes.len());
    for node in &mut schema.nodes {
        let config = NodeConfig::from_schema(node)?;
        if let NodeConfig::Http(http) = &config {
            let extracted = template_bindings(http)?;
            debug!(node = %node.key, count = extracted.len(), "template bindings");
            node.add_input_source(extracted);
        }
        node.inputs = deduplicate_input_fields(std::mem::take(&mut node.inputs));
        configs.push(config);
    }

    validate_references(&schema)?;
    let order = FlowGraph::from_schema(&schema).topological_order()?;
    let entry = single_of_kind(&schema, NodeKind::Entry)?;
    let exit = single_of_kind(&schema, NodeKind::Exit)?;

    let nodes = schema
        .nodes
        .into_iter()
        .zip(configs)
        .map(|(node, config)| {
            let key: Arc<str> = Arc::from(node.key.as_str());
            (
                Arc::clone(&key),
                CompiledNode {
                    key,
                    schema: node,
                    config,
                },
            )
        })
        .collect();

    debug!(order = ?order, "workflow compiled");
    Ok(CompiledWorkflow {
        nodes,
        order,
        entry,
        exit,
    })
}
