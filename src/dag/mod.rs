//! DAG Module - workflow definition, validation and compilation
//!
//! - `workflow`: WorkflowSchema, Edge (YAML/JSON loading)
//! - `validate`: Reference and edge validation
//! - `flow`: FlowGraph (dependencies, cycle detection, ordering)
//! - `compile`: NodeConfig, CompiledWorkflow
//!
//! Compilation runs once per workflow; the result is immutable and shared
//! by every run.

mod compile;
mod flow;
mod validate;
mod workflow;

pub use compile::{compile, CompiledNode, CompiledWorkflow, NodeConfig};
pub use flow::{DepVec, FlowGraph};
pub use validate::validate_references;
pub use workflow::{Edge, WorkflowSchema};
