//! flowcore - workflow execution core (v0.1)
//!
//! ## Module Architecture (DDD-Inspired)
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/       Node schema, field bindings, type info           │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  dag/       Compilation (WorkflowSchema → CompiledWorkflow)  │
//! │  binding/   Field resolution (extract, dedup, resolve)       │
//! │  runtime/   Execution (Runner, ExecutionContext)             │
//! │  nodes/     Node executors (HTTP requester, database)        │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  store/     Shared value space (DataStore, NodeResult)       │
//! │  signal/    Cancellation signal store (flag + broadcast)     │
//! │  event/     Audit trail (EventLog, EventKind)                │
//! │  util/      Constants                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | `NodeSchema`, `FieldInfo`, `TypeInfo` |
//! | [`dag`] | YAML/JSON loading, validation, topological order |
//! | [`binding`] | `block_output_` extraction, dedup, `{{var}}` rendering |
//! | [`runtime`] | Sequential execution with cancellation checkpoints |
//! | [`nodes`] | `NodeExecutor` implementations |
//! | [`store`] | Thread-safe node output storage (DashMap) |
//! | [`signal`] | `CancelSignalStore` trait + in-process store |
//! | [`event`] | Event log for audit trail |
//! | [`config`] | Engine defaults from TOML + env |
//! | [`error`] | Error types with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL - Schema & field model
// ═══════════════════════════════════════════════════════════════
pub mod ast;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - Compilation and execution
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod dag;
pub mod nodes;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Storage, signals, events
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod signal;
pub mod store;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{FixSuggestion, FlowError, Result};

// Config types
pub use config::{CancelSettings, EngineConfig, HttpSettings};

// AST types (Domain Model)
pub use ast::{
    DataType, ExceptionPolicy, FieldInfo, FieldPath, FieldSource, NodeKind, NodeSchema, Reference,
    TypeInfo,
};

// DAG types
pub use dag::{compile, CompiledNode, CompiledWorkflow, FlowGraph, NodeConfig, WorkflowSchema};

// Binding types
pub use binding::{deduplicate_input_fields, extract_input_fields_from_template, resolve_inputs};

// Runtime types (Application Layer)
pub use runtime::{ExecuteMode, ExecutionContext, RunOutcome, Runner};

// Node executors
pub use nodes::database::{DatabaseNode, DatabaseOperator, InMemoryDatabase};
pub use nodes::http::{HttpRequester, HttpTransport, ReqwestTransport};
pub use nodes::{NodeExecutor, Passthrough};

// Signal types
pub use signal::{CancelSignalStore, CancelSubscription, CancelWatcher, MemorySignalStore};

// Event types
pub use event::{Event, EventKind, EventLog};

// Store types
pub use store::{DataStore, NodeResult, NodeStatus};
