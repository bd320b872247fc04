//! Runtime Module - Workflow execution
//!
//! Contains the runtime execution components:
//! - `context`: ExecutionContext, ExecuteMode (per-run state)
//! - `runner`: Runner, RunOutcome (sequential execution in topological order)
//!
//! This module represents the "how" - runtime execution.
//! For static structure, see the `ast` and `dag` modules.

mod context;
mod runner;

// Re-export public types
pub use context::{ExecuteMode, ExecutionContext};
pub use runner::{RunOutcome, Runner, SUB_WORKFLOW_OUTPUT};
