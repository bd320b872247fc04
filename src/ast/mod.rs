//! AST Module - Schema & field model for compiled nodes
//!
//! Contains the declarative representation of a workflow node:
//! - `node`: NodeSchema, NodeKind, ExceptionPolicy
//! - `field`: FieldInfo, FieldSource, Reference, FieldPath
//! - `types`: TypeInfo, DataType
//!
//! These types represent the "what" - static structure parsed from YAML/JSON.
//! For compilation see the `dag` module, for execution the `runtime` module.

mod field;
mod node;
mod types;

// Re-export all public types
pub use field::{FieldInfo, FieldPath, FieldSource, Reference};
pub use node::{
    ExceptionPolicy, NodeKind, NodeSchema, CONFIG_WORKFLOW_ID, CONFIG_WORKFLOW_VERSION,
};
pub use types::{DataType, TypeInfo};
